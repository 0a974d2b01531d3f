//! Minor-unit helpers.
//!
//! Amounts live as `i64` minor units (cents) in the database, the API and
//! the gateway wire format. Conversion to major units happens only here.

/// Minor units per major unit (KES, NGN, USD, ...).
pub const MINOR_PER_MAJOR: i64 = 100;

/// Minor units to a major-unit figure for display.
pub fn to_major(minor: i64) -> f64 {
    minor as f64 / MINOR_PER_MAJOR as f64
}

/// Require a strictly positive amount, naming the field in the error.
pub fn require_positive(field: &str, amount_minor: i64) -> Result<(), crate::error::AppError> {
    if amount_minor <= 0 {
        return Err(crate::error::AppError::InvalidRequest(format!(
            "{field} must be positive"
        )));
    }
    Ok(())
}
