//! Membership domain module.
//!
//! Tiers, gated features, daily quota limits and boost packs.
//!
//! # Module Structure
//!
//! - `aggregate` - UserMembership entity
//! - `boost_pack` - BoostPack balance and the pack catalog
//! - `check_result` - Allow/deny decisions
//! - `feature` - The gated capabilities
//! - `tier` - MembershipTier levels
//! - `tier_config` - Limits, features and pricing per tier

mod aggregate;
mod boost_pack;
mod check_result;
mod errors;
mod feature;
mod tier;
mod tier_config;

pub use aggregate::UserMembership;
pub use boost_pack::{BoostPack, BoostPackConfig, BoostPackType};
pub use check_result::CheckResult;
pub use errors::MembershipError;
pub use feature::Feature;
pub use tier::MembershipTier;
pub use tier_config::{Features, Limits, TierConfig};
