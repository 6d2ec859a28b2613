//! # Repository Module
//!
//! Database repository implementations for Stockline.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Service (stockline-api)                                               │
//! │       │                                                                 │
//! │       │  db.products().get(tenant_id, id)                              │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── create / get / get_by_sku / list / update / delete               │
//! │  └── low_stock                                                         │
//! │       │                                                                 │
//! │       │  SQL (tenant_id always in the WHERE clause)                    │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`TenantRepository`](tenant::TenantRepository) - tenants, registration
//! - [`RoleRepository`](role::RoleRepository) - seeded roles
//! - [`UserRepository`](user::UserRepository) - accounts and profiles
//! - [`SupplierRepository`](supplier::SupplierRepository) - suppliers
//! - [`ProductRepository`](product::ProductRepository) - products and stock levels
//! - [`InventoryRepository`](inventory::InventoryRepository) - stock movements
//! - [`OrderRepository`](order::OrderRepository) - orders and reconciliation
//! - [`RefreshTokenRepository`](token::RefreshTokenRepository) - token rotation
//! - [`ReportRepository`](report::ReportRepository) - aggregates and report files

pub mod inventory;
pub mod order;
pub mod product;
pub mod report;
pub mod role;
pub mod supplier;
pub mod tenant;
pub mod token;
pub mod user;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

// =============================================================================
// Shared Query Types
// =============================================================================

/// A window over a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(offset: i64, limit: i64) -> Self {
        PageRequest { offset, limit }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            offset: 0,
            limit: 10,
        }
    }
}

/// An inclusive time window. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        DateRange { start, end }
    }

    /// Appends `AND column >= ? AND column <= ?` for the bounds that are set.
    pub(crate) fn push_filter(&self, qb: &mut QueryBuilder<'_, Sqlite>, column: &str) {
        if let Some(start) = self.start {
            qb.push(format!(" AND {column} >= ")).push_bind(start);
        }
        if let Some(end) = self.end {
            qb.push(format!(" AND {column} <= ")).push_bind(end);
        }
    }
}

/// Builds a `LIKE` pattern matching `term` anywhere, with `%`, `_` and `\`
/// escaped. Use together with `ESCAPE '\'`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by repository tests.

    use crate::pool::{Database, DbConfig};
    use crate::repository::user::NewUser;
    use stockline_core::{PlanType, Product, RoleName, Tenant, User};

    use super::product::NewProduct;

    pub async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn tenant(db: &Database, name: &str) -> Tenant {
        db.tenants().create(name, PlanType::Free).await.unwrap()
    }

    pub async fn user(db: &Database, tenant: &Tenant, email: &str, role: RoleName) -> User {
        db.users()
            .create(NewUser {
                tenant_id: tenant.id.clone(),
                role,
                email: email.to_string(),
                password_hash: "hash".to_string(),
                full_name: format!("User {email}"),
            })
            .await
            .unwrap()
    }

    pub async fn product(db: &Database, tenant: &Tenant, sku: &str, stock: i64, min: i64) -> Product {
        db.products()
            .create(NewProduct {
                tenant_id: tenant.id.clone(),
                supplier_id: None,
                sku: sku.to_string(),
                name: format!("Product {sku}"),
                description: None,
                price_cost_cents: 100,
                price_sale_cents: 250,
                min_stock: min,
                current_stock: stock,
            })
            .await
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("coke"), "%coke%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
