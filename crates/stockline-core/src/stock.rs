//! # Stock Accounting
//!
//! The two places where stock levels change:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Inventory transactions                                              │
//! │                                                                         │
//! │     IN  q          current + q                                          │
//! │     OUT q          current - q   (fails if the result would be < 0)     │
//! │     ADJUSTMENT q   q             (absolute recount)                     │
//! │                                                                         │
//! │  2. Order status transitions                                            │
//! │                                                                         │
//! │     * ──► Completed            Deduct every line (all or nothing)       │
//! │     Completed ──► Cancelled    Restore every line                       │
//! │     anything else              no stock change                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The functions here only compute. The database layer applies the result
//! inside a transaction with a guarded `UPDATE`, so two concurrent requests
//! can never both take the last unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{OrderStatus, TransactionType};
use crate::MAX_QUANTITY;

// =============================================================================
// Inventory Transactions
// =============================================================================

impl TransactionType {
    /// Reason recorded when the caller does not supply one.
    pub const fn default_reason(&self) -> &'static str {
        match self {
            TransactionType::In => "Stock entry",
            TransactionType::Out => "Stock exit",
            TransactionType::Adjustment => "Manual adjustment",
        }
    }

    /// Smallest quantity accepted for this kind of movement. A recount to
    /// zero is a legitimate adjustment, a movement of zero units is not.
    pub const fn min_quantity(&self) -> i64 {
        match self {
            TransactionType::Adjustment => 0,
            _ => 1,
        }
    }
}

/// Computes the stock level after applying a movement.
///
/// ## Returns
/// * `Ok(new_stock)` - the level to persist
/// * `Err(InsufficientStock)` - OUT would drive stock negative
/// * `Err(Validation)` - quantity outside the bounds for the type, or a
///   resulting level above [`MAX_QUANTITY`]
pub fn apply_transaction(
    sku: &str,
    current: i64,
    kind: TransactionType,
    quantity: i64,
) -> CoreResult<i64> {
    if !(kind.min_quantity()..=MAX_QUANTITY).contains(&quantity) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: kind.min_quantity(),
            max: MAX_QUANTITY,
        }
        .into());
    }

    match kind {
        TransactionType::In => current
            .checked_add(quantity)
            .filter(|stock| *stock <= MAX_QUANTITY)
            .ok_or_else(|| {
                ValidationError::OutOfRange {
                    field: "current_stock".to_string(),
                    min: 0,
                    max: MAX_QUANTITY,
                }
                .into()
            }),
        TransactionType::Out => {
            if current < quantity {
                return Err(CoreError::InsufficientStock {
                    sku: sku.to_string(),
                    available: current,
                    requested: quantity,
                });
            }
            Ok(current - quantity)
        }
        TransactionType::Adjustment => Ok(quantity),
    }
}

// =============================================================================
// Order Transitions
// =============================================================================

/// What a status change does to the stock of the order's products.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    None,
    /// Subtract each line quantity. Every line must be covered.
    Deduct,
    /// Add each line quantity back.
    Restore,
}

impl StockEffect {
    pub fn for_transition(from: OrderStatus, to: OrderStatus) -> StockEffect {
        match (from, to) {
            (from, OrderStatus::Completed) if from != OrderStatus::Completed => StockEffect::Deduct,
            (OrderStatus::Completed, OrderStatus::Cancelled) => StockEffect::Restore,
            _ => StockEffect::None,
        }
    }

    /// Signed multiplier applied to a line quantity.
    pub const fn sign(&self) -> i64 {
        match self {
            StockEffect::None => 0,
            StockEffect::Deduct => -1,
            StockEffect::Restore => 1,
        }
    }
}

/// One line to check before deducting stock.
#[derive(Debug, Clone)]
pub struct StockRequirement<'a> {
    pub sku: &'a str,
    pub available: i64,
    pub requested: i64,
}

/// Verifies every line can be covered, reporting the first one that can't.
pub fn ensure_sufficient<'a, I>(lines: I) -> CoreResult<()>
where
    I: IntoIterator<Item = StockRequirement<'a>>,
{
    for line in lines {
        if line.available < line.requested {
            return Err(CoreError::InsufficientStock {
                sku: line.sku.to_string(),
                available: line.available,
                requested: line.requested,
            });
        }
    }
    Ok(())
}

/// Formats an order number: `ORD-YYYYMMDD-NNNN`, `sequence` starting at 1.
pub fn order_number(date: NaiveDate, sequence: u32) -> String {
    format!("ORD-{}-{:04}", date.format("%Y%m%d"), sequence)
}

// =============================================================================
// Stock Status Filter
// =============================================================================

/// Product list filter.
///
/// ```text
///   current_stock = 0                    → out_of_stock
///   0 < current_stock < min_stock        → low_stock
///   current_stock ≥ min_stock (and > 0)  → in_stock
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    #[default]
    All,
    LowStock,
    OutOfStock,
    InStock,
}

impl StockStatus {
    /// SQL predicate over the `products` table, or `None` for `All`.
    pub const fn sql_predicate(&self) -> Option<&'static str> {
        match self {
            StockStatus::All => None,
            StockStatus::LowStock => Some("current_stock > 0 AND current_stock < min_stock"),
            StockStatus::OutOfStock => Some("current_stock <= 0"),
            StockStatus::InStock => Some("current_stock > 0 AND current_stock >= min_stock"),
        }
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StockStatus::All => "all",
            StockStatus::LowStock => "low_stock",
            StockStatus::OutOfStock => "out_of_stock",
            StockStatus::InStock => "in_stock",
        })
    }
}

impl FromStr for StockStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(StockStatus::All),
            "low_stock" => Ok(StockStatus::LowStock),
            "out_of_stock" => Ok(StockStatus::OutOfStock),
            "in_stock" => Ok(StockStatus::InStock),
            _ => Err(ValidationError::NotAllowed {
                field: "stock_status".to_string(),
                allowed: ["all", "low_stock", "out_of_stock", "in_stock"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
