//! Membership and quota error types.
//!
//! Denials of a capability question are not errors; they are `CheckResult`
//! values. These errors cover storage failures, rejected mutations and
//! invalid input.
//!
//! # Error Code Mapping
//!
//! | Error | Code |
//! |-------|------|
//! | NotFound | USER_NOT_FOUND |
//! | StoreUnavailable | DATABASE_ERROR |
//! | QuotaExceeded | QUOTA_EXCEEDED |
//! | BatchSizeExceeded | BATCH_SIZE_EXCEEDED |
//! | InvalidPackType | INVALID_PACK_TYPE |
//! | InvalidPack | INVALID_PACK |
//! | InvalidTier | INVALID_TIER |
//! | ValidationFailed | VALIDATION_FAILED |

use crate::domain::foundation::{ErrorCode, UserId, ValidationError};

/// Membership-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipError {
    /// The durable backend requires a user row and none exists.
    NotFound(UserId),

    /// Backend I/O failure or timeout.
    StoreUnavailable(String),

    /// Neither daily allotment nor a valid boost pack remains.
    QuotaExceeded { used: i64, limit: u32 },

    /// Batch submission larger than the tier allows.
    BatchSizeExceeded { requested: u32, max: u32 },

    /// Unknown boost pack size.
    InvalidPackType(String),

    /// Decrement attempted on an empty, expired or missing pack.
    InvalidPack(UserId),

    /// Unknown membership tier.
    InvalidTier(String),

    /// Validation failed.
    ValidationFailed { field: String, message: String },
}

impl MembershipError {
    pub fn not_found(user_id: UserId) -> Self {
        MembershipError::NotFound(user_id)
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        MembershipError::StoreUnavailable(message.into())
    }

    pub fn quota_exceeded(used: i64, limit: u32) -> Self {
        MembershipError::QuotaExceeded { used, limit }
    }

    pub fn batch_size_exceeded(requested: u32, max: u32) -> Self {
        MembershipError::BatchSizeExceeded { requested, max }
    }

    pub fn invalid_pack_type(pack_type: impl Into<String>) -> Self {
        MembershipError::InvalidPackType(pack_type.into())
    }

    pub fn invalid_pack(user_id: UserId) -> Self {
        MembershipError::InvalidPack(user_id)
    }

    pub fn invalid_tier(tier: impl Into<String>) -> Self {
        MembershipError::InvalidTier(tier.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        MembershipError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            MembershipError::NotFound(_) => ErrorCode::UserNotFound,
            MembershipError::StoreUnavailable(_) => ErrorCode::DatabaseError,
            MembershipError::QuotaExceeded { .. } => ErrorCode::QuotaExceeded,
            MembershipError::BatchSizeExceeded { .. } => ErrorCode::BatchSizeExceeded,
            MembershipError::InvalidPackType(_) => ErrorCode::InvalidPackType,
            MembershipError::InvalidPack(_) => ErrorCode::InvalidPack,
            MembershipError::InvalidTier(_) => ErrorCode::InvalidTier,
            MembershipError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            MembershipError::NotFound(user_id) => format!("User not found: {}", user_id),
            MembershipError::StoreUnavailable(msg) => format!("Store unavailable: {}", msg),
            MembershipError::QuotaExceeded { used, limit } => format!(
                "Daily quota exhausted ({}/{}) and no valid boost pack",
                used, limit
            ),
            MembershipError::BatchSizeExceeded { requested, max } => format!(
                "Batch of {} exceeds the maximum of {} for this tier",
                requested, max
            ),
            MembershipError::InvalidPackType(t) => format!("Invalid boost pack type: {}", t),
            MembershipError::InvalidPack(user_id) => {
                format!("User {} has no valid boost pack", user_id)
            }
            MembershipError::InvalidTier(tier) => format!("Invalid membership tier: {}", tier),
            MembershipError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
        }
    }

    /// Returns true if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MembershipError::StoreUnavailable(_))
    }
}

impl std::fmt::Display for MembershipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for MembershipError {}

impl From<ValidationError> for MembershipError {
    fn from(err: ValidationError) -> Self {
        MembershipError::ValidationFailed {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user_id() -> UserId {
        UserId::new("user-test-123").unwrap()
    }

    // ============================================================
    // Constructor Tests
    // ============================================================

    #[test]
    fn not_found_creates_correctly() {
        let user_id = test_user_id();
        let err = MembershipError::not_found(user_id.clone());
        assert!(matches!(err, MembershipError::NotFound(ref u) if *u == user_id));
        assert_eq!(err.code(), ErrorCode::UserNotFound);
    }

    #[test]
    fn store_unavailable_creates_correctly() {
        let err = MembershipError::store_unavailable("connection refused");
        assert!(matches!(
            err,
            MembershipError::StoreUnavailable(ref m) if m == "connection refused"
        ));
        assert_eq!(err.code(), ErrorCode::DatabaseError);
    }

    #[test]
    fn quota_exceeded_creates_correctly() {
        let err = MembershipError::quota_exceeded(5, 5);
        assert!(matches!(err, MembershipError::QuotaExceeded { used: 5, limit: 5 }));
        assert_eq!(err.code(), ErrorCode::QuotaExceeded);
    }

    #[test]
    fn batch_size_exceeded_creates_correctly() {
        let err = MembershipError::batch_size_exceeded(10, 5);
        assert_eq!(err.code(), ErrorCode::BatchSizeExceeded);
        assert!(err.message().contains("10"));
        assert!(err.message().contains('5'));
    }

    #[test]
    fn invalid_pack_type_creates_correctly() {
        let err = MembershipError::invalid_pack_type("jumbo");
        assert!(matches!(err, MembershipError::InvalidPackType(ref t) if t == "jumbo"));
        assert_eq!(err.code(), ErrorCode::InvalidPackType);
    }

    #[test]
    fn invalid_pack_creates_correctly() {
        let err = MembershipError::invalid_pack(test_user_id());
        assert_eq!(err.code(), ErrorCode::InvalidPack);
    }

    #[test]
    fn invalid_tier_creates_correctly() {
        let err = MembershipError::invalid_tier("super_premium");
        assert!(matches!(err, MembershipError::InvalidTier(ref t) if t == "super_premium"));
        assert_eq!(err.code(), ErrorCode::InvalidTier);
    }

    #[test]
    fn validation_creates_correctly() {
        let err = MembershipError::validation("videos", "must be at least 1");
        assert!(matches!(
            err,
            MembershipError::ValidationFailed { ref field, ref message }
            if field == "videos" && message == "must be at least 1"
        ));
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
    }

    // ============================================================
    // Message Tests
    // ============================================================

    #[test]
    fn not_found_message_includes_user() {
        let user_id = test_user_id();
        let err = MembershipError::not_found(user_id.clone());
        assert!(err.message().contains(user_id.as_str()));
    }

    #[test]
    fn display_matches_message() {
        let err = MembershipError::quota_exceeded(20, 20);
        assert_eq!(err.to_string(), err.message());
    }

    // ============================================================
    // Retryable Tests
    // ============================================================

    #[test]
    fn only_store_unavailable_is_retryable() {
        assert!(MembershipError::store_unavailable("timeout").is_retryable());
        assert!(!MembershipError::quota_exceeded(5, 5).is_retryable());
        assert!(!MembershipError::invalid_pack(test_user_id()).is_retryable());
        assert!(!MembershipError::not_found(test_user_id()).is_retryable());
    }

    // ============================================================
    // Conversion Tests
    // ============================================================

    #[test]
    fn from_validation_error_keeps_field() {
        let err: MembershipError = ValidationError::empty_field("user_id").into();
        assert!(matches!(
            err,
            MembershipError::ValidationFailed { ref field, .. } if field == "user_id"
        ));
    }
}
