//! # Domain Types
//!
//! Core entities of the Stockline backend.
//!
//! ## Entity Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Tenant ──┬──► User ◄── Role (ADMIN | MANAGER | EMPLOYEE)              │
//! │           │     │                                                       │
//! │           │     ├──► RefreshToken                                       │
//! │           │     └──► Report                                             │
//! │           │                                                             │
//! │           ├──► Supplier ──► Product (supplier_id nullable)              │
//! │           │                    │                                        │
//! │           │                    ├──► InventoryTransaction (IN/OUT/ADJ)   │
//! │           │                    └──► OrderItem ◄── Order                 │
//! │           │                                                             │
//! │  Every row below Tenant carries tenant_id; queries always filter on it │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity is keyed by a UUID v4 string. Business identifiers (sku,
//! order_number, email) are unique but never used as foreign keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Enum helpers
// =============================================================================

/// Implements `Display` and `FromStr` for a fieldless enum from a table of
/// `(variant, wire name)` pairs.
macro_rules! wire_enum {
    ($ty:ident, $field:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Wire name as stored in the database and sent in JSON.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }

            /// All variants, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $(n if n.eq_ignore_ascii_case($name) => Ok($ty::$variant),)+
                    _ => Err(ValidationError::NotAllowed {
                        field: $field.to_string(),
                        allowed: vec![$($name.to_string()),+],
                    }),
                }
            }
        }
    };
}

// =============================================================================
// Tenant
// =============================================================================

/// Subscription plan of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    #[default]
    Free,
    Basic,
    Premium,
}

wire_enum!(PlanType, "plan_type", { Free => "free", Basic => "basic", Premium => "premium" });

/// An isolated business account.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub plan_type: PlanType,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Roles & Users
// =============================================================================

/// Role names used for access control. Stored uppercase in `roles.name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoleName {
    Admin,
    Manager,
    Employee,
}

wire_enum!(RoleName, "role", { Admin => "ADMIN", Manager => "MANAGER", Employee => "EMPLOYEE" });

/// A row of the `roles` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Role {
    pub id: String,
    pub name: RoleName,
    pub description: Option<String>,
}

/// A user account. The password hash never leaves the database layer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub tenant_id: String,
    pub role_id: String,
    /// Name of the role, joined from `roles`.
    pub role: RoleName,
    pub email: String,
    pub full_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[ts(as = "Option<String>")]
    pub last_login: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role == RoleName::Admin
    }
}

// =============================================================================
// Supplier
// =============================================================================

/// A supplier products can be bought from.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A stocked product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub tenant_id: String,
    pub supplier_id: Option<String>,
    /// Stock Keeping Unit, unique per tenant.
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    /// Purchase price in cents.
    pub price_cost_cents: i64,
    /// Selling price in cents.
    pub price_sale_cents: i64,
    /// Reorder threshold.
    pub min_stock: i64,
    /// Units on hand. Never negative.
    pub current_stock: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price_cost(&self) -> Money {
        Money::from_cents(self.price_cost_cents)
    }

    #[inline]
    pub fn price_sale(&self) -> Money {
        Money::from_cents(self.price_sale_cents)
    }

    /// Stock valued at purchase price.
    pub fn value_at_cost(&self) -> Money {
        self.price_cost().multiply_quantity(self.current_stock)
    }

    /// Stock valued at selling price.
    pub fn value_at_sale(&self) -> Money {
        self.price_sale().multiply_quantity(self.current_stock)
    }
}

// =============================================================================
// Inventory Transactions
// =============================================================================

/// Kind of stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Goods received. Adds to stock.
    In,
    /// Goods issued. Subtracts from stock.
    Out,
    /// Stock count correction. Sets stock to an absolute value.
    Adjustment,
}

wire_enum!(TransactionType, "type", { In => "in", Out => "out", Adjustment => "adjustment" });

/// An audit row for one stock movement.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryTransaction {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub user_id: String,
    pub supplier_id: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Orders
// =============================================================================

/// Lifecycle of an order.
///
/// ```text
///            ┌──────────────► Cancelled
///            │                    ▲
///   Pending ─┤                    │ (restore stock)
///            │                    │
///            └──► Completed ──────┘
///             (deduct stock)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

wire_enum!(OrderStatus, "status", { Pending => "pending", Completed => "completed", Cancelled => "cancelled" });

/// Order header.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    /// Human-readable number, `ORD-YYYYMMDD-NNNN`.
    pub order_number: String,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// One line of an order. `unit_price_cents` is a snapshot of the sale price
/// at the time the order was placed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

// =============================================================================
// Reports
// =============================================================================

/// Category of a generated report file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Sales,
    Inventory,
    Movements,
}

wire_enum!(ReportType, "type", { Sales => "sales", Inventory => "inventory", Movements => "movements" });

/// A generated report file.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Report {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    /// Public path of the file, e.g. `/uploads/reports/report-SALES-...pdf`.
    pub url: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
