//! # Refresh Token Repository
//!
//! Refresh tokens are tracked by their JWT id (`jti`) so they can be rotated
//! and revoked.
//!
//! ## Rotation
//! ```text
//!   refresh(A)  ──►  A.revoked_at = now, A.replaced_by = B,  insert B
//!   refresh(A)  ──►  A already revoked: reuse detected
//!                    revoke every live token of the user
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::DbResult;

/// A stored refresh token.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

/// Result of [`RefreshTokenRepository::rotate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// The old token was live and is now replaced.
    Rotated,
    /// The old token had already been used. All of the user's tokens were
    /// revoked.
    Reused,
    /// No such token, or it belongs to someone else.
    Unknown,
}

#[derive(Debug, Clone)]
pub struct RefreshTokenRepository {
    pool: SqlitePool,
}

impl RefreshTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RefreshTokenRepository { pool }
    }

    pub async fn insert(&self, jti: &str, user_id: &str, expires_at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(jti)
        .bind(user_id)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, jti: &str) -> DbResult<Option<RefreshTokenRecord>> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            "SELECT id, user_id, expires_at, revoked_at, replaced_by, created_at
             FROM refresh_tokens WHERE id = ?1",
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Replaces `old_jti` with `new_jti` in one transaction.
    pub async fn rotate(
        &self,
        old_jti: &str,
        new_jti: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<Rotation> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let revoked: Option<Option<DateTime<Utc>>> = sqlx::query_scalar(
            "SELECT revoked_at FROM refresh_tokens WHERE id = ?1 AND user_id = ?2",
        )
        .bind(old_jti)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        match revoked {
            None => return Ok(Rotation::Unknown),
            Some(Some(_)) => {
                let result = sqlx::query(
                    "UPDATE refresh_tokens SET revoked_at = ?2 WHERE user_id = ?1 AND revoked_at IS NULL",
                )
                .bind(user_id)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;

                warn!(
                    user_id = %user_id,
                    revoked = result.rows_affected(),
                    "Refresh token reuse detected, revoked all sessions"
                );
                return Ok(Rotation::Reused);
            }
            Some(None) => {}
        }

        sqlx::query("UPDATE refresh_tokens SET revoked_at = ?2, replaced_by = ?3 WHERE id = ?1")
            .bind(old_jti)
            .bind(now)
            .bind(new_jti)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(new_jti)
        .bind(user_id)
        .bind(expires_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Rotation::Rotated)
    }

    /// Revokes one token. Revoking twice is a no-op.
    pub async fn revoke(&self, jti: &str) -> DbResult<()> {
        sqlx::query("UPDATE refresh_tokens SET revoked_at = ?2 WHERE id = ?1 AND revoked_at IS NULL")
            .bind(jti)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Revokes every live token of a user, returning how many were live.
    pub async fn revoke_all(&self, user_id: &str) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ?2 WHERE user_id = ?1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(user_id = %user_id, revoked = result.rows_affected(), "Revoked refresh tokens");
        Ok(result.rows_affected())
    }

    /// Drops a user's expired tokens.
    pub async fn purge_expired(&self, user_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?1 AND expires_at < ?2")
            .bind(user_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;
    use chrono::Duration;
    use stockline_core::RoleName;

    #[tokio::test]
    async fn test_rotate_then_reuse_revokes_everything() {
        let db = test_support::db().await;
        let tenant = test_support::tenant(&db, "Acme").await;
        let user = test_support::user(&db, &tenant, "bo@acme.test", RoleName::Employee).await;
        let tokens = db.refresh_tokens();
        let expires = Utc::now() + Duration::days(7);

        tokens.insert("a", &user.id, expires).await.unwrap();
        tokens.insert("other-device", &user.id, expires).await.unwrap();

        assert_eq!(tokens.rotate("a", "b", &user.id, expires).await.unwrap(), Rotation::Rotated);
        let a = tokens.get("a").await.unwrap().unwrap();
        assert_eq!(a.replaced_by.as_deref(), Some("b"));
        assert!(tokens.get("b").await.unwrap().unwrap().is_live(Utc::now()));

        // Presenting A again is reuse
        assert_eq!(tokens.rotate("a", "c", &user.id, expires).await.unwrap(), Rotation::Reused);
        assert!(!tokens.get("b").await.unwrap().unwrap().is_live(Utc::now()));
        assert!(!tokens.get("other-device").await.unwrap().unwrap().is_live(Utc::now()));
        assert!(tokens.get("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_and_foreign_tokens() {
        let db = test_support::db().await;
        let tenant = test_support::tenant(&db, "Acme").await;
        let bo = test_support::user(&db, &tenant, "bo@acme.test", RoleName::Employee).await;
        let al = test_support::user(&db, &tenant, "al@acme.test", RoleName::Employee).await;
        let tokens = db.refresh_tokens();
        let expires = Utc::now() + Duration::days(7);

        tokens.insert("a", &bo.id, expires).await.unwrap();
        assert_eq!(tokens.rotate("nope", "x", &bo.id, expires).await.unwrap(), Rotation::Unknown);
        assert_eq!(tokens.rotate("a", "x", &al.id, expires).await.unwrap(), Rotation::Unknown);
    }

    #[tokio::test]
    async fn test_revoke_and_purge() {
        let db = test_support::db().await;
        let tenant = test_support::tenant(&db, "Acme").await;
        let user = test_support::user(&db, &tenant, "bo@acme.test", RoleName::Employee).await;
        let tokens = db.refresh_tokens();

        tokens.insert("old", &user.id, Utc::now() - Duration::days(1)).await.unwrap();
        tokens.insert("live", &user.id, Utc::now() + Duration::days(1)).await.unwrap();

        tokens.revoke("live").await.unwrap();
        assert!(tokens.get("live").await.unwrap().unwrap().revoked_at.is_some());

        assert_eq!(tokens.purge_expired(&user.id).await.unwrap(), 1);
        assert!(tokens.get("old").await.unwrap().is_none());
        assert_eq!(tokens.revoke_all(&user.id).await.unwrap(), 0);
    }
}
