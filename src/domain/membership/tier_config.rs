//! Tier catalog: limits, feature flags, pricing and priority per tier.
//!
//! The catalog is a process-wide static table. It is never mutated, so any
//! number of tasks may read it without locking.

use serde::Serialize;
use std::cmp::Ordering;

use super::{Feature, MembershipTier};

/// Quota limits for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Limits {
    /// Videos processed per calendar day. None = unlimited.
    pub videos_per_day: Option<u32>,
    /// Maximum videos accepted in a single batch submission.
    pub batch_size: u32,
}

impl Limits {
    pub fn is_unlimited(&self) -> bool {
        self.videos_per_day.is_none()
    }

    /// Check if the daily limit has been reached.
    ///
    /// Returns false if unlimited or under limit.
    pub fn daily_limit_reached(&self, used: i64) -> bool {
        self.videos_per_day
            .map(|max| used >= i64::from(max))
            .unwrap_or(false)
    }
}

/// Independent feature switches for a tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Features {
    pub ai_translation: bool,
    pub translation_optimize: bool,
    pub ai_title_generation: bool,
    pub gemini_video_analysis: bool,
    pub auto_upload: bool,
    pub priority_queue: bool,
    pub api_access: bool,
    pub custom_template: bool,
    pub data_export: bool,
    pub team_collaboration: bool,
}

impl Features {
    const NONE: Features = Features {
        ai_translation: false,
        translation_optimize: false,
        ai_title_generation: false,
        gemini_video_analysis: false,
        auto_upload: false,
        priority_queue: false,
        api_access: false,
        custom_template: false,
        data_export: false,
        team_collaboration: false,
    };

    /// Looks up the flag backing `feature`.
    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::AiTranslation => self.ai_translation,
            Feature::TranslationOptimize => self.translation_optimize,
            Feature::AiTitleGeneration => self.ai_title_generation,
            Feature::GeminiVideoAnalysis => self.gemini_video_analysis,
            Feature::AutoUpload => self.auto_upload,
            Feature::PriorityQueue => self.priority_queue,
            Feature::ApiAccess => self.api_access,
            Feature::CustomTemplate => self.custom_template,
            Feature::DataExport => self.data_export,
            Feature::TeamCollaboration => self.team_collaboration,
        }
    }

    /// Enabled features in catalog order.
    pub fn enabled(&self) -> Vec<Feature> {
        Feature::ALL
            .iter()
            .copied()
            .filter(|f| self.is_enabled(*f))
            .collect()
    }
}

/// Catalog entry for one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierConfig {
    pub tier: MembershipTier,
    pub name: &'static str,
    pub description: &'static str,
    /// Monthly price in cents.
    pub monthly_price_cents: u32,
    /// Yearly price in cents.
    pub yearly_price_cents: u32,
    pub limits: Limits,
    pub features: Features,
    /// Queue priority, strictly increasing with tier rank.
    pub priority: u8,
}

/// # Tier Configuration
///
/// | Tier | Videos/day | Batch | Priority | Monthly |
/// |------|-----------|-------|----------|---------|
/// | Free | 5 | 1 | 0 | 0 |
/// | Basic | 20 | 5 | 1 | 29 |
/// | Pro | 100 | 20 | 2 | 99 |
/// | Enterprise | Unlimited | 100 | 3 | 299 |
static TIER_CATALOG: [TierConfig; 4] = [
    TierConfig {
        tier: MembershipTier::Free,
        name: "Free",
        description: "Core features for personal evaluation",
        monthly_price_cents: 0,
        yearly_price_cents: 0,
        limits: Limits {
            videos_per_day: Some(5),
            batch_size: 1,
        },
        features: Features::NONE,
        priority: 0,
    },
    TierConfig {
        tier: MembershipTier::Basic,
        name: "Basic",
        description: "AI-assisted features for light users",
        monthly_price_cents: 2_900,
        yearly_price_cents: 29_000,
        limits: Limits {
            videos_per_day: Some(20),
            batch_size: 5,
        },
        features: Features {
            ai_translation: true,
            ai_title_generation: true,
            custom_template: true,
            ..Features::NONE
        },
        priority: 1,
    },
    TierConfig {
        tier: MembershipTier::Pro,
        name: "Pro",
        description: "Every creator feature unlocked",
        monthly_price_cents: 9_900,
        yearly_price_cents: 99_000,
        limits: Limits {
            videos_per_day: Some(100),
            batch_size: 20,
        },
        features: Features {
            ai_translation: true,
            translation_optimize: true,
            ai_title_generation: true,
            gemini_video_analysis: true,
            auto_upload: true,
            priority_queue: true,
            custom_template: true,
            data_export: true,
            ..Features::NONE
        },
        priority: 2,
    },
    TierConfig {
        tier: MembershipTier::Enterprise,
        name: "Enterprise",
        description: "Unlimited usage for teams and businesses",
        monthly_price_cents: 29_900,
        yearly_price_cents: 299_000,
        limits: Limits {
            videos_per_day: None,
            batch_size: 100,
        },
        features: Features {
            ai_translation: true,
            translation_optimize: true,
            ai_title_generation: true,
            gemini_video_analysis: true,
            auto_upload: true,
            priority_queue: true,
            api_access: true,
            custom_template: true,
            data_export: true,
            team_collaboration: true,
        },
        priority: 3,
    },
];

impl TierConfig {
    /// Get the catalog entry for a specific tier.
    pub fn for_tier(tier: MembershipTier) -> &'static TierConfig {
        match tier {
            MembershipTier::Free => &TIER_CATALOG[0],
            MembershipTier::Basic => &TIER_CATALOG[1],
            MembershipTier::Pro => &TIER_CATALOG[2],
            MembershipTier::Enterprise => &TIER_CATALOG[3],
        }
    }

    /// Looks up a tier by its stored name, falling back to the free entry.
    pub fn for_name(name: &str) -> &'static TierConfig {
        Self::for_tier(MembershipTier::parse_or_free(name))
    }

    /// All entries, lowest priority first.
    pub fn all() -> &'static [TierConfig] {
        &TIER_CATALOG
    }

    /// Orders two tiers by configured priority.
    pub fn compare(a: MembershipTier, b: MembershipTier) -> Ordering {
        Self::for_tier(a).priority.cmp(&Self::for_tier(b).priority)
    }
}
