//! # stockline-core: Pure Business Logic for Stockline
//!
//! This crate holds the domain model of the Stockline inventory backend as
//! plain types and pure functions. It never touches the database, the
//! network or the file system.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockline Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  stockline-api (axum)                           │   │
//! │  │    routes ──► services ──► repositories                         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockline-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   stock   │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │  apply()  │  │   rules   │  │   │
//! │  │   │   Order   │  │           │  │  effects  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  stockline-db (Database Layer)                  │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (Tenant, User, Product, Order, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`stock`] - Stock accounting for inventory transactions and orders
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation rules
//!
//! ## Example Usage
//!
//! ```rust
//! use stockline_core::stock::apply_transaction;
//! use stockline_core::TransactionType;
//!
//! let stock = apply_transaction("SKU-1", 10, TransactionType::Out, 4).unwrap();
//! assert_eq!(stock, 6);
//!
//! // Selling more than is on the shelf is rejected
//! assert!(apply_transaction("SKU-1", 3, TransactionType::Out, 5).is_err());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use stock::{StockEffect, StockStatus};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Largest page size any list endpoint will return.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Number of rows shown in the "low stock" report widget.
pub const LOW_STOCK_REPORT_LIMIT: u32 = 10;

/// Maximum avatar upload size (5 MB).
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Largest stock level, and largest quantity on a movement or order line.
pub const MAX_QUANTITY: i64 = 1_000_000_000;

/// Largest unit price in cents.
pub const MAX_PRICE_CENTS: i64 = 1_000_000_000;

/// Minimum password length for accounts.
pub const MIN_PASSWORD_LENGTH: usize = 8;
