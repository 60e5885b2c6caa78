//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers and error types that form the
//! vocabulary of the entitlement domain.

mod errors;
mod ids;
mod timestamp;
mod usage_date;

pub use errors::{ErrorCode, ValidationError};
pub use ids::UserId;
pub use timestamp::Timestamp;
pub use usage_date::UsageDate;
