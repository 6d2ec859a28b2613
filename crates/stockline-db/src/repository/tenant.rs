//! # Tenant Repository
//!
//! Tenants and the registration flow that creates a tenant together with
//! its first administrator.
//!
//! ```text
//! register("Acme", admin)
//!      │
//!      ▼
//! BEGIN
//!   INSERT tenants        (UNIQUE name)
//!   INSERT users          (role = ADMIN, UNIQUE email)
//! COMMIT                  ← either both rows exist or neither
//! ```

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::user::USER_SELECT;
use super::{new_id, PageRequest};
use crate::error::{DbError, DbResult};
use stockline_core::{PlanType, RoleName, Tenant, User};

const TENANT_COLUMNS: &str = "id, name, plan_type, is_active, created_at, updated_at";

/// A tenant with the number of users and products it owns.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TenantWithCounts {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub tenant: Tenant,
    pub users_count: i64,
    pub products_count: i64,
}

/// Partial update of a tenant. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct TenantUpdate {
    pub name: Option<String>,
    pub plan_type: Option<PlanType>,
    pub is_active: Option<bool>,
}

/// First administrator of a tenant being registered.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub business_name: String,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct TenantRepository {
    pool: SqlitePool,
}

impl TenantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TenantRepository { pool }
    }

    /// Creates a tenant.
    ///
    /// ## Returns
    /// * `Err(UniqueViolation)` - name already taken
    pub async fn create(&self, name: &str, plan_type: PlanType) -> DbResult<Tenant> {
        let now = Utc::now();
        let id = new_id();

        sqlx::query(
            "INSERT INTO tenants (id, name, plan_type, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?4)",
        )
        .bind(&id)
        .bind(name)
        .bind(plan_type)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_name(e, name))?;

        info!(tenant_id = %id, name = %name, "Tenant created");
        self.get(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Tenant", &id))
    }

    /// Creates a tenant and its ADMIN user in one transaction.
    pub async fn register(&self, account: NewAccount) -> DbResult<(Tenant, User)> {
        let now = Utc::now();
        let tenant_id = new_id();
        let user_id = new_id();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO tenants (id, name, plan_type, is_active, created_at, updated_at)
             VALUES (?1, ?2, 'free', 1, ?3, ?3)",
        )
        .bind(&tenant_id)
        .bind(&account.business_name)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_name(e, &account.business_name))?;

        sqlx::query(
            "INSERT INTO users (id, tenant_id, role_id, email, password_hash, full_name, created_at, updated_at)
             VALUES (?1, ?2, (SELECT id FROM roles WHERE name = ?3), ?4, ?5, ?6, ?7, ?7)",
        )
        .bind(&user_id)
        .bind(&tenant_id)
        .bind(RoleName::Admin)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.full_name)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &account.email),
            other => other,
        })?;

        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?1"
        ))
        .bind(&tenant_id)
        .fetch_one(&mut *tx)
        .await?;

        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_SELECT} WHERE u.id = ?1"))
            .bind(&user_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(tenant_id = %tenant_id, user_id = %user_id, "Tenant registered");
        Ok((tenant, user))
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE name = ?1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    /// Gets a tenant with its user and product counts.
    pub async fn get_with_counts(&self, id: &str) -> DbResult<Option<TenantWithCounts>> {
        let tenant = sqlx::query_as::<_, TenantWithCounts>(&format!(
            "SELECT {TENANT_COLUMNS},
                    (SELECT COUNT(*) FROM users u WHERE u.tenant_id = t.id) AS users_count,
                    (SELECT COUNT(*) FROM products p WHERE p.tenant_id = t.id) AS products_count
             FROM tenants t WHERE t.id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    /// Finds another tenant using `name`, ignoring `exclude_id`.
    pub async fn name_taken(&self, name: &str, exclude_id: Option<&str>) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tenants WHERE name = ?1 AND (?2 IS NULL OR id <> ?2)",
        )
        .bind(name)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Lists tenants, newest first, with counts.
    pub async fn list(&self, page: PageRequest) -> DbResult<(Vec<TenantWithCounts>, i64)> {
        let tenants = sqlx::query_as::<_, TenantWithCounts>(&format!(
            "SELECT {TENANT_COLUMNS},
                    (SELECT COUNT(*) FROM users u WHERE u.tenant_id = t.id) AS users_count,
                    (SELECT COUNT(*) FROM products p WHERE p.tenant_id = t.id) AS products_count
             FROM tenants t
             ORDER BY t.created_at DESC, t.rowid DESC
             LIMIT ?1 OFFSET ?2"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants")
            .fetch_one(&self.pool)
            .await?;

        Ok((tenants, total))
    }

    /// Applies a partial update.
    pub async fn update(&self, id: &str, update: TenantUpdate) -> DbResult<Tenant> {
        let result = sqlx::query(
            "UPDATE tenants SET
                name = COALESCE(?2, name),
                plan_type = COALESCE(?3, plan_type),
                is_active = COALESCE(?4, is_active),
                updated_at = ?5
             WHERE id = ?1",
        )
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.plan_type)
        .bind(update.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_name(e, update.name.as_deref().unwrap_or_default()))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tenant", id));
        }

        debug!(tenant_id = %id, "Tenant updated");
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Tenant", id))
    }

    /// Deletes a tenant. Users, products, orders and everything else that
    /// belongs to it go with it (ON DELETE CASCADE).
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tenant", id));
        }

        info!(tenant_id = %id, "Tenant deleted");
        Ok(())
    }
}

fn duplicate_name(err: sqlx::Error, name: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { field, .. } => DbError::duplicate(field, name),
        other => other,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;

    fn account(business: &str, email: &str) -> NewAccount {
        NewAccount {
            business_name: business.to_string(),
            full_name: "Ana Owner".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_creates_tenant_and_admin() {
        let db = test_support::db().await;
        let (tenant, user) = db
            .tenants()
            .register(account("Acme", "ana@acme.test"))
            .await
            .unwrap();

        assert_eq!(tenant.plan_type, PlanType::Free);
        assert_eq!(user.tenant_id, tenant.id);
        assert_eq!(user.role, RoleName::Admin);
    }

    #[tokio::test]
    async fn test_register_rolls_back_on_duplicate_email() {
        let db = test_support::db().await;
        db.tenants()
            .register(account("Acme", "ana@acme.test"))
            .await
            .unwrap();

        let err = db
            .tenants()
            .register(account("Other", "ana@acme.test"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        // The second tenant row must not survive the failed registration
        assert!(!db.tenants().name_taken("Other", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_tenant_name() {
        let db = test_support::db().await;
        test_support::tenant(&db, "Acme").await;
        let err = db.tenants().create("Acme", PlanType::Basic).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "name"));
    }

    #[tokio::test]
    async fn test_counts_and_update() {
        let db = test_support::db().await;
        let tenant = test_support::tenant(&db, "Acme").await;
        test_support::user(&db, &tenant, "a@acme.test", RoleName::Employee).await;
        test_support::product(&db, &tenant, "SKU-1", 5, 1).await;

        let counted = db.tenants().get_with_counts(&tenant.id).await.unwrap().unwrap();
        assert_eq!(counted.users_count, 1);
        assert_eq!(counted.products_count, 1);

        let updated = db
            .tenants()
            .update(
                &tenant.id,
                TenantUpdate {
                    plan_type: Some(PlanType::Premium),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Acme");
        assert_eq!(updated.plan_type, PlanType::Premium);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let db = test_support::db().await;
        let tenant = test_support::tenant(&db, "Acme").await;
        let product = test_support::product(&db, &tenant, "SKU-1", 5, 1).await;
        let user = test_support::user(&db, &tenant, "bo@acme.test", RoleName::Employee).await;
        db.orders()
            .create(crate::repository::order::NewOrder {
                tenant_id: tenant.id.clone(),
                user_id: user.id.clone(),
                notes: None,
                lines: vec![crate::repository::order::NewOrderLine {
                    product_id: product.id.clone(),
                    quantity: 1,
                }],
            })
            .await
            .unwrap();

        // Orders and their lines go with the tenant
        db.tenants().delete(&tenant.id).await.unwrap();
        assert!(db.users().get(&user.id).await.unwrap().is_none());
        assert!(db.products().get(&tenant.id, &product.id).await.unwrap().is_none());
        assert!(matches!(
            db.tenants().delete(&tenant.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
