//! MySQL implementation of the Directory trait.
//!
//! Verified bindings live in the `verified_members` table, one row per
//! identity, with a unique index on the email column.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row};

use cv_core::domain::{Identity, VerifiedMember};
use cv_core::errors::{DomainError, DomainResult};
use cv_core::repositories::Directory;

/// MySQL implementation of Directory
pub struct MySqlDirectory {
    pool: MySqlPool,
}

impl MySqlDirectory {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn row_to_member(row: &sqlx::mysql::MySqlRow) -> DomainResult<VerifiedMember> {
        let identity: String = row.try_get("identity").map_err(column_error("identity"))?;

        Ok(VerifiedMember {
            identity: Identity::new(identity),
            name: row.try_get("name").map_err(column_error("name"))?,
            email: row.try_get("email").map_err(column_error("email"))?,
            verified_at: row
                .try_get::<DateTime<Utc>, _>("verified_at")
                .map_err(column_error("verified_at"))?,
        })
    }
}

fn column_error(column: &'static str) -> impl Fn(sqlx::Error) -> DomainError {
    move |e| DomainError::Directory {
        message: format!("Failed to get {}: {}", column, e),
    }
}

fn query_error(action: &'static str) -> impl Fn(sqlx::Error) -> DomainError {
    move |e| DomainError::Directory {
        message: format!("Failed to {}: {}", action, e),
    }
}

#[async_trait]
impl Directory for MySqlDirectory {
    async fn find_member(&self, identity: &Identity) -> DomainResult<Option<VerifiedMember>> {
        let row = sqlx::query(
            "SELECT identity, name, email, verified_at FROM verified_members WHERE identity = ?",
        )
        .bind(identity.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error("find member"))?;

        row.as_ref().map(Self::row_to_member).transpose()
    }

    async fn is_email_taken(&self, email: &str) -> DomainResult<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS taken FROM verified_members WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(query_error("check email"))?;

        let taken: i64 = row.try_get("taken").map_err(column_error("taken"))?;
        Ok(taken > 0)
    }

    async fn commit(
        &self,
        identity: &Identity,
        name: &str,
        email: &str,
    ) -> DomainResult<VerifiedMember> {
        let member = VerifiedMember::new(identity.clone(), name, email);

        let mut tx = self.pool.begin().await.map_err(query_error("begin commit"))?;

        let holder = sqlx::query("SELECT identity FROM verified_members WHERE email = ? FOR UPDATE")
            .bind(email)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_error("lock email"))?;

        if let Some(row) = holder {
            let holder: String = row.try_get("identity").map_err(column_error("identity"))?;
            if holder != identity.as_str() {
                return Err(DomainError::Conflict {
                    message: "Email is already bound to another identity".to_string(),
                });
            }
        }

        let result = sqlx::query(
            r#"
            INSERT INTO verified_members (identity, name, email, verified_at)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                name = VALUES(name),
                email = VALUES(email),
                verified_at = VALUES(verified_at)
            "#,
        )
        .bind(member.identity.as_str())
        .bind(&member.name)
        .bind(&member.email)
        .bind(member.verified_at)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {}
            // Lost a race with another writer on the email index
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(DomainError::Conflict {
                    message: "Email is already bound to another identity".to_string(),
                });
            }
            Err(e) => return Err(query_error("commit member")(e)),
        }

        tx.commit().await.map_err(query_error("commit member"))?;

        tracing::info!(
            identity = %identity,
            event = "member_committed",
            "Verified member stored"
        );

        Ok(member)
    }
}
