//! Membership tier definitions.
//!
//! Represents the entitlement levels a user can hold.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use super::{MembershipError, TierConfig};

/// Membership tier.
///
/// Determines feature access, daily quota, batch size and queue priority.
/// Tiers are totally ordered by their configured priority; `Free` is always
/// the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipTier {
    /// Free tier - 5 videos/day, no paid features.
    Free,

    /// Basic tier - 20 videos/day, AI translation and titles.
    Basic,

    /// Pro tier - 100 videos/day, everything except API and teams.
    Pro,

    /// Enterprise tier - unlimited videos, every feature.
    Enterprise,
}

impl MembershipTier {
    /// Every tier, lowest priority first.
    pub const ALL: [MembershipTier; 4] = [
        MembershipTier::Free,
        MembershipTier::Basic,
        MembershipTier::Pro,
        MembershipTier::Enterprise,
    ];

    /// Returns true if this tier is a paid tier.
    pub fn is_paid(&self) -> bool {
        !matches!(self, MembershipTier::Free)
    }

    /// Returns the storage/wire name for this tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipTier::Free => "free",
            MembershipTier::Basic => "basic",
            MembershipTier::Pro => "pro",
            MembershipTier::Enterprise => "enterprise",
        }
    }

    /// Returns the display name for this tier.
    pub fn display_name(&self) -> &'static str {
        self.config().name
    }

    /// The catalog entry for this tier.
    pub fn config(&self) -> &'static TierConfig {
        TierConfig::for_tier(*self)
    }

    /// Scheduling priority; higher runs first.
    pub fn priority(&self) -> u8 {
        self.config().priority
    }

    /// The next tier strictly above this one, if any.
    pub fn next_higher(&self) -> Option<MembershipTier> {
        Self::ALL
            .iter()
            .copied()
            .filter(|t| t.priority() > self.priority())
            .min_by_key(|t| t.priority())
    }

    /// Returns true if `self` ranks strictly above `other`.
    pub fn is_higher_than(&self, other: MembershipTier) -> bool {
        self.cmp(&other) == Ordering::Greater
    }

    /// Parses a stored tier name, falling back to `Free` for anything
    /// unrecognised (including empty values from legacy rows).
    pub fn parse_or_free(s: &str) -> MembershipTier {
        s.parse().unwrap_or(MembershipTier::Free)
    }
}

impl PartialOrd for MembershipTier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MembershipTier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority().cmp(&other.priority())
    }
}

impl FromStr for MembershipTier {
    type Err = MembershipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(MembershipTier::Free),
            "basic" => Ok(MembershipTier::Basic),
            "pro" => Ok(MembershipTier::Pro),
            "enterprise" => Ok(MembershipTier::Enterprise),
            other => Err(MembershipError::invalid_tier(other)),
        }
    }
}

impl std::fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
