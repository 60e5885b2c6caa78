//! Error types for the domain layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i64, max: i64, actual: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::EmptyField { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. } => field,
        }
    }
}

/// Machine-readable error and denial codes, organized by category.
///
/// The same codes appear on storage errors and on `CheckResult` denials so
/// a calling layer can render both from one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,
    InvalidTier,
    InvalidPackType,

    // Not found errors
    UserNotFound,

    // Entitlement denials
    FeatureNotAllowed,
    QuotaExceeded,
    BatchSizeExceeded,
    InvalidPack,

    // Infrastructure errors
    MembershipError,
    UsageError,
    DatabaseError,
    CacheError,
    Timeout,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::InvalidTier => "INVALID_TIER",
            ErrorCode::InvalidPackType => "INVALID_PACK_TYPE",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::FeatureNotAllowed => "FEATURE_NOT_ALLOWED",
            ErrorCode::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorCode::BatchSizeExceeded => "BATCH_SIZE_EXCEEDED",
            ErrorCode::InvalidPack => "INVALID_PACK",
            ErrorCode::MembershipError => "MEMBERSHIP_ERROR",
            ErrorCode::UsageError => "USAGE_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::CacheError => "CACHE_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_empty_field_displays_correctly() {
        let err = ValidationError::empty_field("user_id");
        assert_eq!(format!("{}", err), "Field 'user_id' cannot be empty");
    }

    #[test]
    fn validation_error_out_of_range_displays_correctly() {
        let err = ValidationError::out_of_range("videos", 1, 10_000, 0);
        assert_eq!(
            format!("{}", err),
            "Field 'videos' must be between 1 and 10000, got 0"
        );
        assert_eq!(err.field(), "videos");
    }

    #[test]
    fn error_code_display_matches_serde() {
        for code in [
            ErrorCode::QuotaExceeded,
            ErrorCode::BatchSizeExceeded,
            ErrorCode::FeatureNotAllowed,
            ErrorCode::InvalidPackType,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code));
        }
    }
}
