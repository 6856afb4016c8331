//! Common validation utilities.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    /// utorids are 7-8 alphanumeric characters.
    static ref UTORID_RE: Regex = Regex::new(r"^[A-Za-z0-9]{7,8}$").unwrap();
}

/// Validates the utorid handle format.
pub fn validate_utorid(utorid: &str) -> Result<(), ValidationError> {
    if UTORID_RE.is_match(utorid) {
        Ok(())
    } else {
        let mut err = ValidationError::new("utorid_format");
        err.message = Some("utorid must be 7-8 alphanumeric characters".into());
        Err(err)
    }
}

/// Validates that a currency amount is non-negative with at most two decimals.
///
/// Spent amounts travel as fractional currency; points are always integers.
pub fn validate_spent(spent: f64) -> Result<(), ValidationError> {
    if !spent.is_finite() || spent < 0.0 {
        let mut err = ValidationError::new("spent_range");
        err.message = Some("spent must be a non-negative number".into());
        return Err(err);
    }
    let cents = spent * 100.0;
    if (cents - cents.round()).abs() > 1e-6 {
        let mut err = ValidationError::new("spent_precision");
        err.message = Some("spent must have at most two decimal places".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that a point amount is a positive integer.
pub fn validate_positive_amount(amount: i64) -> Result<(), ValidationError> {
    if amount > 0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("amount_range");
        err.message = Some("amount must be a positive integer".into());
        Err(err)
    }
}

/// Validates that a time window is well-formed (end strictly after start).
pub fn validate_window(
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if end_time > start_time {
        Ok(())
    } else {
        let mut err = ValidationError::new("window_order");
        err.message = Some("endTime must be after startTime".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_validate_utorid_accepts_valid() {
        assert!(validate_utorid("loyal001").is_ok());
        assert!(validate_utorid("abc1234").is_ok());
        assert!(validate_utorid("ABCD1234").is_ok());
    }

    #[test]
    fn test_validate_utorid_rejects_invalid() {
        assert!(validate_utorid("short1").is_err());
        assert!(validate_utorid("waytoolong1").is_err());
        assert!(validate_utorid("bad-char").is_err());
        assert!(validate_utorid("").is_err());
    }

    #[test]
    fn test_validate_spent_accepts_two_decimals() {
        assert!(validate_spent(0.0).is_ok());
        assert!(validate_spent(19.99).is_ok());
        assert!(validate_spent(50.0).is_ok());
    }

    #[test]
    fn test_validate_spent_rejects_negative() {
        assert!(validate_spent(-0.01).is_err());
    }

    #[test]
    fn test_validate_spent_rejects_sub_cent() {
        assert!(validate_spent(1.999).is_err());
        assert!(validate_spent(0.001).is_err());
    }

    #[test]
    fn test_validate_spent_rejects_non_finite() {
        assert!(validate_spent(f64::NAN).is_err());
        assert!(validate_spent(f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_positive_amount() {
        assert!(validate_positive_amount(1).is_ok());
        assert!(validate_positive_amount(0).is_err());
        assert!(validate_positive_amount(-5).is_err());
    }

    #[test]
    fn test_validate_window() {
        let start = Utc.with_ymd_and_hms(2025, 9, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap();
        assert!(validate_window(start, end).is_ok());
        assert!(validate_window(end, start).is_err());
        assert!(validate_window(start, start).is_err());
    }
}
