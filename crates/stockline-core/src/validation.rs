//! # Validation Module
//!
//! Input validation rules applied by the API before a request reaches the
//! database.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: JSON deserialization (serde, unknown fields rejected)        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (lengths, formats, ranges)                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite (NOT NULL, UNIQUE, FOREIGN KEY, CHECK)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockline_core::validation::{validate_email, validate_sku};
//!
//! validate_sku("COKE-330").unwrap();
//! assert!(validate_email("not-an-email").is_err());
//! ```

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::error::ValidationError;
use crate::{MAX_QUANTITY, MIN_PASSWORD_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 50 characters
/// - Letters, digits, hyphens and underscores only
///
/// ```rust
/// use stockline_core::validation::validate_sku;
///
/// assert!(validate_sku("SKU-001").is_ok());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
    }

    if sku.chars().count() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::invalid(
            "sku",
            "must contain only letters, numbers, hyphens, and underscores",
        ));
    }

    Ok(())
}

/// Validates a required free-text field such as a name.
///
/// Returns the trimmed value.
pub fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Validates an optional free-text field. Blank strings become `None`.
pub fn validate_optional_text(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> ValidationResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        Some(v) => Ok(Some(v.to_string())),
    }
}

/// Validates an email address and returns it lowercased.
///
/// Deliberately loose: one `@`, a non-empty local part, and a domain that
/// contains a dot and does not start or end with one.
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::required("email"));
    }

    if email.len() > 254 {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: 254,
        });
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::invalid("email", "must be a valid email address"));
    }

    Ok(email.to_lowercase())
}

/// Validates a new password.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::required("password"));
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LENGTH,
        });
    }

    if password.len() > 128 {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max: 128,
        });
    }

    Ok(())
}

/// Validates a website URL (http or https).
pub fn validate_website(url: &str) -> ValidationResult<()> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));

    match rest {
        Some(host) if !host.is_empty() && !host.chars().any(char::is_whitespace) => Ok(()),
        _ => Err(ValidationError::invalid(
            "website",
            "must be an http or https URL",
        )),
    }
}

/// Validates a search query.
///
/// Empty queries are allowed and mean "no filter". Returns the trimmed
/// query, or `None` when blank.
pub fn validate_search_query(query: Option<&str>) -> ValidationResult<Option<String>> {
    validate_optional_text("search", query, 100)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a value that may be zero but not negative and not above `max`
/// (prices, stock levels).
pub fn validate_amount(field: &str, value: i64, max: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    if value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max,
        });
    }
    Ok(())
}

/// Validates a line or movement quantity: at least one unit, at most
/// [`MAX_QUANTITY`].
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty < 1 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if qty > MAX_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_QUANTITY,
        });
    }
    Ok(())
}

/// Parses a `sort_order` parameter. Returns `true` for ascending.
///
/// Missing means descending.
pub fn parse_sort_order(value: Option<&str>) -> ValidationResult<bool> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("desc") => Ok(false),
        Some("asc") => Ok(true),
        Some(_) => Err(ValidationError::NotAllowed {
            field: "sort_order".to_string(),
            allowed: vec!["asc".to_string(), "desc".to_string()],
        }),
    }
}

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a UUID string.
///
/// ```rust
/// use stockline_core::validation::validate_uuid;
///
/// assert!(validate_uuid("product_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("product_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::invalid(field, "must be a valid UUID"))?;

    Ok(())
}

// =============================================================================
// Date Validators
// =============================================================================

/// Parses a date filter bound.
///
/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates. A plain date is
/// midnight UTC, or the last nanosecond of that day when `end_of_day` is
/// set, so that an end date covers the whole day.
pub fn parse_date_bound(field: &str, value: &str, end_of_day: bool) -> ValidationResult<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ValidationError::invalid(field, "expected YYYY-MM-DD or RFC 3339"))?;

    let time = if end_of_day {
        NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| ValidationError::invalid(field, "invalid time of day"))?;

    Ok(date.and_time(time).and_utc())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sort_order() {
        assert_eq!(parse_sort_order(None), Ok(false));
        assert_eq!(parse_sort_order(Some("ASC")), Ok(true));
        assert_eq!(parse_sort_order(Some("desc")), Ok(false));
        assert!(parse_sort_order(Some("sideways")).is_err());
    }

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("COKE-330").is_ok());
        assert!(validate_sku("ABC123").is_ok());
        assert!(validate_sku("product_1").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_required_text_trims() {
        assert_eq!(
            validate_required_text("name", "  Acme  ", 100).unwrap(),
            "Acme"
        );
        assert_eq!(
            validate_required_text("name", "   ", 100),
            Err(ValidationError::required("name"))
        );
        assert!(validate_required_text("name", &"x".repeat(101), 100).is_err());
    }

    #[test]
    fn test_optional_text_blank_is_none() {
        assert_eq!(validate_optional_text("notes", Some("  "), 10).unwrap(), None);
        assert_eq!(validate_optional_text("notes", None, 10).unwrap(), None);
        assert_eq!(
            validate_optional_text("notes", Some(" hi "), 10).unwrap(),
            Some("hi".to_string())
        );
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email("Ana@Example.com").unwrap(), "ana@example.com");
        assert!(validate_email("").is_err());
        assert!(validate_email("ana.example.com").is_err());
        assert!(validate_email("ana@localhost").is_err());
        assert!(validate_email("a b@example.com").is_err());
        assert!(validate_email("ana@@example.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("correct-horse").is_ok());
        assert!(matches!(
            validate_password("short"),
            Err(ValidationError::TooShort { min: 8, .. })
        ));
    }

    #[test]
    fn test_validate_website() {
        assert!(validate_website("https://acme.example").is_ok());
        assert!(validate_website("http://acme.example/path").is_ok());
        assert!(validate_website("ftp://acme.example").is_err());
        assert!(validate_website("https://").is_err());
    }

    #[test]
    fn test_numeric_validators() {
        assert!(validate_amount("price_sale_cents", 0, 100).is_ok());
        assert!(validate_amount("price_sale_cents", 100, 100).is_ok());
        assert!(matches!(
            validate_amount("price_sale_cents", -1, 100),
            Err(ValidationError::Negative { .. })
        ));
        assert!(matches!(
            validate_amount("price_sale_cents", i64::MAX, 100),
            Err(ValidationError::OutOfRange { max: 100, .. })
        ));
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(MAX_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "123").is_err());
    }

    #[test]
    fn test_parse_date_bound() {
        let start = parse_date_bound("start_date", "2025-01-31", false).unwrap();
        assert_eq!(start.to_rfc3339(), "2025-01-31T00:00:00+00:00");

        let end = parse_date_bound("end_date", "2025-01-31", true).unwrap();
        assert_eq!(end.timestamp_subsec_nanos(), 999_999_999);
        assert_eq!(end.format("%H:%M:%S").to_string(), "23:59:59");

        let exact = parse_date_bound("end_date", "2025-01-31T10:00:00Z", true).unwrap();
        assert_eq!(exact.format("%H:%M").to_string(), "10:00");

        assert!(parse_date_bound("start_date", "31/01/2025", false).is_err());
    }
}
