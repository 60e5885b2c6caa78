//! Boost packs: purchasable, time-boxed overflow allowance.
//!
//! A user holds at most one pack record. New purchases stack into it while
//! it is valid; once exhausted or expired it is logically dead but may stay
//! in storage until the next purchase replaces it.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::domain::foundation::{Timestamp, UserId};

use super::MembershipError;

/// A user's boost pack balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostPack {
    pub user_id: UserId,
    pub videos_remaining: i64,
    /// None for a user who never bought a pack.
    pub expires_at: Option<Timestamp>,
    pub last_purchase_at: Option<Timestamp>,
}

impl BoostPack {
    /// Zero-value pack for a user without one.
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            videos_remaining: 0,
            expires_at: None,
            last_purchase_at: None,
        }
    }

    /// Valid iff it has videos left and has not yet expired at `now`.
    pub fn is_valid_at(&self, now: &Timestamp) -> bool {
        self.videos_remaining > 0 && self.expires_at.is_some_and(|end| now.is_before(&end))
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(&Timestamp::now())
    }

    /// Videos usable right now; 0 for an invalid pack.
    pub fn available_videos(&self) -> i64 {
        if self.is_valid() {
            self.videos_remaining
        } else {
            0
        }
    }

    /// Whole days until expiry; 0 for an invalid pack.
    pub fn days_until_expiry(&self) -> i64 {
        let now = Timestamp::now();
        match self.expires_at {
            Some(end) if self.is_valid_at(&now) => end.whole_days_after(&now),
            _ => 0,
        }
    }

    /// Whether this pack is a newer state of the user's pack than `stored`.
    ///
    /// A later purchase always wins. Within one purchase the balance only
    /// falls, so the lower balance is the newer state.
    pub fn supersedes(&self, stored: &BoostPack) -> bool {
        match self.last_purchase_at.cmp(&stored.last_purchase_at) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.videos_remaining < stored.videos_remaining,
        }
    }

    /// Folds a purchase of `config` made at `now` into this pack.
    ///
    /// While this pack is valid the purchase stacks: balances add and the
    /// expiry moves to whichever is later, the current end or
    /// `now + valid_days`. Otherwise the purchase starts a fresh pack.
    /// Returns the new pack and whether it was a fresh purchase.
    pub fn apply_purchase(&self, config: &BoostPackConfig, now: Timestamp) -> (BoostPack, bool) {
        let purchase_end = now.add_days(config.valid_days);

        match self.expires_at {
            Some(current_end) if self.is_valid_at(&now) => {
                let expires_at = if purchase_end.is_after(&current_end) {
                    purchase_end
                } else {
                    current_end
                };
                let pack = BoostPack {
                    user_id: self.user_id.clone(),
                    videos_remaining: self.videos_remaining + config.videos,
                    expires_at: Some(expires_at),
                    last_purchase_at: Some(now),
                };
                (pack, false)
            }
            _ => {
                let pack = BoostPack {
                    user_id: self.user_id.clone(),
                    videos_remaining: config.videos,
                    expires_at: Some(purchase_end),
                    last_purchase_at: Some(now),
                };
                (pack, true)
            }
        }
    }
}

/// Purchasable pack sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoostPackType {
    Small,
    Medium,
    Large,
}

impl BoostPackType {
    pub const ALL: [BoostPackType; 3] = [
        BoostPackType::Small,
        BoostPackType::Medium,
        BoostPackType::Large,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BoostPackType::Small => "small",
            BoostPackType::Medium => "medium",
            BoostPackType::Large => "large",
        }
    }

    pub fn config(&self) -> &'static BoostPackConfig {
        BoostPackConfig::for_type(*self)
    }
}

impl FromStr for BoostPackType {
    type Err = MembershipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "small" => Ok(BoostPackType::Small),
            "medium" => Ok(BoostPackType::Medium),
            "large" => Ok(BoostPackType::Large),
            other => Err(MembershipError::invalid_pack_type(other)),
        }
    }
}

impl std::fmt::Display for BoostPackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Catalog entry for one pack size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoostPackConfig {
    pub pack_type: BoostPackType,
    pub name: &'static str,
    pub price_cents: u32,
    pub videos: i64,
    pub valid_days: i64,
    pub description: &'static str,
}

static BOOST_PACK_CATALOG: [BoostPackConfig; 3] = [
    BoostPackConfig {
        pack_type: BoostPackType::Small,
        name: "Small boost pack",
        price_cents: 690,
        videos: 10,
        valid_days: 7,
        description: "10 extra videos, valid for 7 days",
    },
    BoostPackConfig {
        pack_type: BoostPackType::Medium,
        name: "Medium boost pack",
        price_cents: 1_990,
        videos: 30,
        valid_days: 15,
        description: "30 extra videos, valid for 15 days",
    },
    BoostPackConfig {
        pack_type: BoostPackType::Large,
        name: "Large boost pack",
        price_cents: 3_990,
        videos: 80,
        valid_days: 30,
        description: "80 extra videos, valid for 30 days",
    },
];

impl BoostPackConfig {
    pub fn for_type(pack_type: BoostPackType) -> &'static BoostPackConfig {
        match pack_type {
            BoostPackType::Small => &BOOST_PACK_CATALOG[0],
            BoostPackType::Medium => &BOOST_PACK_CATALOG[1],
            BoostPackType::Large => &BOOST_PACK_CATALOG[2],
        }
    }

    pub fn all() -> &'static [BoostPackConfig] {
        &BOOST_PACK_CATALOG
    }
}
