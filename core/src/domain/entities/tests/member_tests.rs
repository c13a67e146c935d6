//! Unit tests for verified member entity

use crate::domain::entities::identity::Identity;
use crate::domain::entities::member::{derive_display_name, VerifiedMember};

#[test]
fn test_display_name_from_dotted_local_part() {
    assert_eq!(derive_display_name("t.verhaegen"), "T Verhaegen");
    assert_eq!(derive_display_name("jean.dupont"), "Jean Dupont");
}

#[test]
fn test_display_name_single_segment() {
    assert_eq!(derive_display_name("jdupont"), "Jdupont");
}

#[test]
fn test_display_name_capitalizes_after_non_letters() {
    assert_eq!(derive_display_name("jean-luc.picard"), "Jean-Luc Picard");
    assert_eq!(derive_display_name("o'neil"), "O'Neil");
    assert_eq!(derive_display_name("anna2b"), "Anna2B");
}

#[test]
fn test_display_name_lowercases_tail() {
    assert_eq!(derive_display_name("MARIE.CURIE"), "Marie Curie");
}

#[test]
fn test_display_name_keeps_empty_segments() {
    assert_eq!(derive_display_name("a..b"), "A  B");
}

#[test]
fn test_new_member() {
    let member = VerifiedMember::new(Identity::from(42u64), "T Verhaegen", "t.verhaegen@ulb.be");

    assert_eq!(member.identity.as_str(), "42");
    assert_eq!(member.name, "T Verhaegen");
    assert_eq!(member.email, "t.verhaegen@ulb.be");
    assert!(member.verified_at <= chrono::Utc::now());
}
