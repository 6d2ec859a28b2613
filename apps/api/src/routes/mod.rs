//! Route handlers, one module per resource.
//!
//! Each module exposes `router() -> Router<Arc<AppState>>`, nested under
//! `/api/<resource>` by [`crate::build_router`].
//!
//! - auth: register, login, refresh, logout
//! - tenants: tenant administration and settings
//! - users: profile, avatar, user administration
//! - products: catalogue and stock levels
//! - inventory: stock movements
//! - orders: orders and stock reconciliation
//! - suppliers: supplier CRUD
//! - reports: sales aggregates and PDF exports
//! - dashboard: inventory overview widgets
//! - health: liveness and database check

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod products;
pub mod reports;
pub mod suppliers;
pub mod tenants;
pub mod users;

use serde::Deserialize;

use crate::error::ApiError;
use stockline_core::validation::parse_date_bound;
use stockline_db::DateRange;

/// `start_date` / `end_date` query parameters.
///
/// Both accept `YYYY-MM-DD` or RFC 3339; a plain end date covers the whole
/// day. The camel-case spellings are accepted too.
#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    #[serde(default, alias = "startDate")]
    pub start_date: Option<String>,
    #[serde(default, alias = "endDate")]
    pub end_date: Option<String>,
}

impl DateQuery {
    /// Each bound that is present applies on its own.
    pub fn range(&self) -> Result<DateRange, ApiError> {
        let start = non_blank(&self.start_date)
            .map(|v| parse_date_bound("start_date", v, false))
            .transpose()?;
        let end = non_blank(&self.end_date)
            .map(|v| parse_date_bound("end_date", v, true))
            .transpose()?;

        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ApiError::Validation(
                    "start_date must not be after end_date".to_string(),
                ));
            }
        }

        Ok(DateRange::new(start, end))
    }

    /// The range filters only when both bounds are given.
    pub fn closed_range(&self) -> Result<DateRange, ApiError> {
        let range = self.range()?;
        if range.start.is_some() && range.end.is_some() {
            Ok(range)
        } else {
            Ok(DateRange::default())
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// 403 unless the row belongs to the caller's tenant.
pub(crate) fn ensure_tenant(row_tenant_id: &str, caller_tenant_id: &str) -> Result<(), ApiError> {
    if row_tenant_id == caller_tenant_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Access denied to this resource".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(start: Option<&str>, end: Option<&str>) -> DateQuery {
        DateQuery {
            start_date: start.map(String::from),
            end_date: end.map(String::from),
        }
    }

    #[test]
    fn test_end_date_covers_whole_day() {
        let range = query(Some("2024-03-01"), Some("2024-03-01")).range().unwrap();
        let end = range.end.unwrap();
        assert_eq!(end.format("%H:%M:%S%.9f").to_string(), "23:59:59.999999999");
    }

    #[test]
    fn test_closed_range_needs_both_bounds() {
        assert_eq!(query(Some("2024-03-01"), None).closed_range().unwrap(), DateRange::default());
        assert!(query(Some("2024-03-01"), None).range().unwrap().start.is_some());
    }

    #[test]
    fn test_rejects_bad_dates() {
        assert!(query(Some("yesterday"), None).range().is_err());
        assert!(query(Some("2024-03-02"), Some("2024-03-01")).range().is_err());
        assert_eq!(query(Some("  "), None).range().unwrap(), DateRange::default());
    }
}
