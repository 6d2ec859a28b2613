//! # User Repository
//!
//! Accounts, profiles and credentials.
//!
//! Every read joins `roles` so callers always get the role name with the
//! user. Password hashes are only ever returned by [`UserRepository::credentials`].

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::{new_id, PageRequest};
use crate::error::{DbError, DbResult};
use stockline_core::{RoleName, User};

/// Column list plus FROM/JOIN for [`User`] rows.
pub(crate) const USER_SELECT: &str = "u.id, u.tenant_id, u.role_id, r.name AS role, u.email, \
     u.full_name, u.bio, u.avatar_url, u.last_login, u.created_at, u.updated_at \
     FROM users u JOIN roles r ON r.id = u.role_id";

/// A user to insert.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub tenant_id: String,
    pub role: RoleName,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
}

/// Partial update of a user. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<RoleName>,
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Inserts a user.
    ///
    /// ## Returns
    /// * `Err(UniqueViolation)` - email already registered
    /// * `Err(ForeignKeyViolation)` - tenant does not exist
    pub async fn create(&self, user: NewUser) -> DbResult<User> {
        let id = new_id();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, tenant_id, role_id, email, password_hash, full_name, created_at, updated_at)
             VALUES (?1, ?2, (SELECT id FROM roles WHERE name = ?3), ?4, ?5, ?6, ?7, ?7)",
        )
        .bind(&id)
        .bind(&user.tenant_id)
        .bind(user.role)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &user.email),
            other => other,
        })?;

        info!(user_id = %id, tenant_id = %user.tenant_id, role = %user.role, "User created");
        self.get(&id).await?.ok_or_else(|| DbError::not_found("User", &id))
    }

    /// Gets a user by id, in any tenant.
    pub async fn get(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_SELECT} WHERE u.id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_SELECT} WHERE u.email = ?1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Returns the user and stored password hash for a login attempt.
    pub async fn credentials(&self, email: &str) -> DbResult<Option<(User, String)>> {
        let Some(user) = self.get_by_email(email).await? else {
            return Ok(None);
        };

        let hash: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?1")
            .bind(&user.id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Some((user, hash)))
    }

    /// Whether `email` belongs to a user other than `exclude_id`.
    pub async fn email_taken(&self, email: &str, exclude_id: Option<&str>) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE email = ?1 AND (?2 IS NULL OR id <> ?2)",
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Lists the users of a tenant, newest first.
    pub async fn list_by_tenant(&self, tenant_id: &str, page: PageRequest) -> DbResult<(Vec<User>, i64)> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_SELECT} WHERE u.tenant_id = ?1
             ORDER BY u.created_at DESC, u.rowid DESC
             LIMIT ?2 OFFSET ?3"
        ))
        .bind(tenant_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE tenant_id = ?1")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((users, total))
    }

    /// Counts the users of a tenant holding `role`.
    pub async fn count_by_role(&self, tenant_id: &str, role: RoleName) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users u JOIN roles r ON r.id = u.role_id
             WHERE u.tenant_id = ?1 AND r.name = ?2",
        )
        .bind(tenant_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Applies a partial update.
    pub async fn update(&self, id: &str, update: UserUpdate) -> DbResult<User> {
        let email = update.email.clone();
        let result = sqlx::query(
            "UPDATE users SET
                email = COALESCE(?2, email),
                full_name = COALESCE(?3, full_name),
                bio = COALESCE(?4, bio),
                password_hash = COALESCE(?5, password_hash),
                role_id = COALESCE((SELECT id FROM roles WHERE name = ?6), role_id),
                updated_at = ?7
             WHERE id = ?1",
        )
        .bind(id)
        .bind(update.email)
        .bind(update.full_name)
        .bind(update.bio)
        .bind(update.password_hash)
        .bind(update.role)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => {
                DbError::duplicate(field, email.unwrap_or_default())
            }
            other => other,
        })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        debug!(user_id = %id, "User updated");
        self.get(id).await?.ok_or_else(|| DbError::not_found("User", id))
    }

    /// Sets or clears the avatar URL, returning the previous one.
    pub async fn set_avatar(&self, id: &str, avatar_url: Option<&str>) -> DbResult<Option<String>> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<Option<String>> =
            sqlx::query_scalar("SELECT avatar_url FROM users WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(previous) = previous else {
            return Err(DbError::not_found("User", id));
        };

        sqlx::query("UPDATE users SET avatar_url = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(avatar_url)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(previous)
    }

    pub async fn touch_last_login(&self, id: &str) -> DbResult<()> {
        sqlx::query("UPDATE users SET last_login = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::from(e).in_use_on_delete("User", id))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        info!(user_id = %id, "User deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;

    #[tokio::test]
    async fn test_create_and_fetch_with_role() {
        let db = test_support::db().await;
        let tenant = test_support::tenant(&db, "Acme").await;
        let user = test_support::user(&db, &tenant, "bo@acme.test", RoleName::Manager).await;

        let fetched = db.users().get_by_email("bo@acme.test").await.unwrap().unwrap();
        assert_eq!(fetched.id, user.id);
        assert_eq!(fetched.role, RoleName::Manager);

        let (_, hash) = db.users().credentials("bo@acme.test").await.unwrap().unwrap();
        assert_eq!(hash, "hash");
        assert!(db.users().credentials("nobody@acme.test").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let db = test_support::db().await;
        let tenant = test_support::tenant(&db, "Acme").await;
        test_support::user(&db, &tenant, "bo@acme.test", RoleName::Employee).await;

        let err = db
            .users()
            .create(NewUser {
                tenant_id: tenant.id.clone(),
                role: RoleName::Employee,
                email: "bo@acme.test".to_string(),
                password_hash: "x".to_string(),
                full_name: "Bo Again".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_changes_role_and_keeps_other_fields() {
        let db = test_support::db().await;
        let tenant = test_support::tenant(&db, "Acme").await;
        let user = test_support::user(&db, &tenant, "bo@acme.test", RoleName::Employee).await;

        let updated = db
            .users()
            .update(
                &user.id,
                UserUpdate {
                    bio: Some("Night shift".to_string()),
                    role: Some(RoleName::Manager),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.role, RoleName::Manager);
        assert_eq!(updated.bio.as_deref(), Some("Night shift"));
        assert_eq!(updated.email, "bo@acme.test");
    }

    #[tokio::test]
    async fn test_avatar_returns_previous() {
        let db = test_support::db().await;
        let tenant = test_support::tenant(&db, "Acme").await;
        let user = test_support::user(&db, &tenant, "bo@acme.test", RoleName::Employee).await;

        let prev = db.users().set_avatar(&user.id, Some("/uploads/avatars/a.png")).await.unwrap();
        assert!(prev.is_none());

        let prev = db.users().set_avatar(&user.id, None).await.unwrap();
        assert_eq!(prev.as_deref(), Some("/uploads/avatars/a.png"));
    }

    #[tokio::test]
    async fn test_list_and_count_by_role() {
        let db = test_support::db().await;
        let tenant = test_support::tenant(&db, "Acme").await;
        let other = test_support::tenant(&db, "Other").await;
        test_support::user(&db, &tenant, "a@acme.test", RoleName::Employee).await;
        test_support::user(&db, &tenant, "b@acme.test", RoleName::Employee).await;
        test_support::user(&db, &other, "c@other.test", RoleName::Employee).await;

        let (users, total) = db
            .users()
            .list_by_tenant(&tenant.id, PageRequest::new(0, 1))
            .await
            .unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(total, 2);
        assert_eq!(
            db.users().count_by_role(&tenant.id, RoleName::Employee).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_delete_keeps_users_with_history() {
        use crate::repository::inventory::NewMovement;
        use stockline_core::TransactionType;

        let db = test_support::db().await;
        let tenant = test_support::tenant(&db, "Acme").await;
        let clerk = test_support::user(&db, &tenant, "clerk@acme.test", RoleName::Employee).await;
        let idle = test_support::user(&db, &tenant, "idle@acme.test", RoleName::Employee).await;
        let product = test_support::product(&db, &tenant, "SKU-1", 5, 1).await;
        db.inventory()
            .record(NewMovement {
                tenant_id: tenant.id.clone(),
                product_id: product.id.clone(),
                user_id: clerk.id.clone(),
                supplier_id: None,
                kind: TransactionType::In,
                quantity: 3,
                reason: None,
            })
            .await
            .unwrap();

        let err = db.users().delete(&clerk.id).await.unwrap_err();
        assert!(matches!(err, DbError::InUse { ref entity, .. } if entity == "User"));
        assert!(db.users().get(&clerk.id).await.unwrap().is_some());
        assert_eq!(db.inventory().summary(&tenant.id).await.unwrap().total_transactions, 1);

        db.users().delete(&idle.id).await.unwrap();
    }
}
