//! # Error Types
//!
//! Validation errors for the pure domain layer.
//!
//! ## Design Principles
//! 1. `thiserror` derives, never manual impls
//! 2. context in the message (field name, limits)
//! 3. enum variants, never bare strings

use thiserror::Error;

/// Input validation failures.
///
/// These occur before any side effect and are always recoverable by the
/// caller correcting the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Malformed value (wrong length, wrong characters, failed check digit).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

/// Convenience alias for validation results.
pub type CoreResult<T> = Result<T, ValidationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = ValidationError::Required {
            field: "customer_name".to_string(),
        };
        assert_eq!(err.to_string(), "customer_name is required");

        let err = ValidationError::InvalidFormat {
            field: "tax_id".to_string(),
            reason: "check digit mismatch".to_string(),
        };
        assert_eq!(err.to_string(), "tax_id has invalid format: check digit mismatch");
    }
}
