//! User membership entity.
//!
//! A user's membership names the tier they hold and when it lapses. Users
//! with no stored record are treated as holding a synthesized free
//! membership; records are never hard-deleted.
//!
//! # Design Decisions
//!
//! - **Free never expires**: `expires_at` is ignored for the free tier
//! - **Open-ended grants**: a paid tier with no `expires_at` does not lapse
//! - **Lazy downgrade**: expiry is evaluated on read, no background job flips
//!   the stored tier

use crate::domain::foundation::{Timestamp, UserId};
use serde::{Deserialize, Serialize};

use super::{MembershipTier, TierConfig};

/// A user's tier and its validity window.
///
/// # Invariants
///
/// - `tier == Free` implies never expired
/// - effective tier is `Free` once a paid tier's `expires_at` has passed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMembership {
    /// User who owns this membership.
    pub user_id: UserId,

    /// Stored tier, before expiry is taken into account.
    pub tier: MembershipTier,

    /// When a paid tier lapses. None = no expiry.
    pub expires_at: Option<Timestamp>,

    /// External subscription reference (payment platform), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl UserMembership {
    /// Synthesized record for a user with no stored membership.
    pub fn free(user_id: UserId) -> Self {
        let now = Timestamp::now();
        Self {
            user_id,
            tier: MembershipTier::Free,
            expires_at: None,
            subscription_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A membership at `tier` valid until `expires_at`.
    pub fn with_tier(user_id: UserId, tier: MembershipTier, expires_at: Option<Timestamp>) -> Self {
        Self {
            tier,
            expires_at,
            ..Self::free(user_id)
        }
    }

    /// Checks expiry against an explicit instant.
    pub fn is_expired_at(&self, now: &Timestamp) -> bool {
        if !self.tier.is_paid() {
            return false;
        }
        self.expires_at.is_some_and(|end| now.is_after(&end))
    }

    /// Checks whether a paid tier has lapsed.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(&Timestamp::now())
    }

    /// Tier after accounting for expiry.
    pub fn effective_tier_at(&self, now: &Timestamp) -> MembershipTier {
        if self.is_expired_at(now) {
            MembershipTier::Free
        } else {
            self.tier
        }
    }

    pub fn effective_tier(&self) -> MembershipTier {
        self.effective_tier_at(&Timestamp::now())
    }

    /// Catalog entry for the effective tier.
    pub fn config(&self) -> &'static TierConfig {
        TierConfig::for_tier(self.effective_tier())
    }

    /// Whole days until expiry.
    ///
    /// None for free or open-ended memberships, 0 once expired.
    pub fn days_until_expiry(&self) -> Option<i64> {
        if !self.tier.is_paid() {
            return None;
        }
        let now = Timestamp::now();
        self.expires_at.map(|end| end.whole_days_after(&now))
    }

    /// True for a free record with no paid history.
    ///
    /// This is indistinguishable from the synthesized record for an
    /// unknown user, so caches treat it as a miss.
    pub fn is_default(&self) -> bool {
        self.tier == MembershipTier::Free
            && self.expires_at.is_none()
            && self.subscription_id.is_none()
    }
}
