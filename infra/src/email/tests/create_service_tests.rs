//! Unit tests for email service selection

use crate::config::EmailConfig;
use crate::email::create_email_service;
use crate::InfrastructureError;

fn config(provider: &str) -> EmailConfig {
    EmailConfig {
        provider: provider.to_string(),
        relay_url: "http://127.0.0.1:9/send".to_string(),
        api_key: "primary-key".to_string(),
        backup_relay_url: "http://127.0.0.1:10/send".to_string(),
        backup_api_key: "backup-key".to_string(),
        ..EmailConfig::default()
    }
}

#[test]
fn test_create_mock_service() {
    let service = create_email_service(&config("mock")).unwrap();
    assert_eq!(service.provider_name(), "Mock");
}

#[test]
fn test_create_http_relay_service() {
    let service = create_email_service(&config("http")).unwrap();
    assert_eq!(service.provider_name(), "HttpRelay");
}

#[test]
fn test_create_failover_service() {
    let service = create_email_service(&config("failover")).unwrap();
    assert_eq!(service.provider_name(), "Failover");
}

#[test]
fn test_http_relay_requires_endpoint() {
    let mut config = config("http");
    config.relay_url = String::new();

    assert!(matches!(
        create_email_service(&config),
        Err(InfrastructureError::Config(_))
    ));
}

#[test]
fn test_unknown_provider_is_rejected() {
    assert!(matches!(
        create_email_service(&config("carrier-pigeon")),
        Err(InfrastructureError::Config(_))
    ));
}
