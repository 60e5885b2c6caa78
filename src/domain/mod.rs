//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, days, error codes)
//! - `membership` - Tier catalog, memberships, boost packs and entitlement checks

pub mod foundation;
pub mod membership;
