//! Gated capabilities.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{MembershipTier, TierConfig};

/// A paid capability whose availability depends on the effective tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    AiTranslation,
    TranslationOptimize,
    AiTitleGeneration,
    GeminiVideoAnalysis,
    AutoUpload,
    PriorityQueue,
    ApiAccess,
    CustomTemplate,
    DataExport,
    TeamCollaboration,
}

static FEATURES_BY_NAME: Lazy<HashMap<&'static str, Feature>> =
    Lazy::new(|| Feature::ALL.iter().map(|f| (f.as_str(), *f)).collect());

impl Feature {
    pub const ALL: [Feature; 10] = [
        Feature::AiTranslation,
        Feature::TranslationOptimize,
        Feature::AiTitleGeneration,
        Feature::GeminiVideoAnalysis,
        Feature::AutoUpload,
        Feature::PriorityQueue,
        Feature::ApiAccess,
        Feature::CustomTemplate,
        Feature::DataExport,
        Feature::TeamCollaboration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::AiTranslation => "ai_translation",
            Feature::TranslationOptimize => "translation_optimize",
            Feature::AiTitleGeneration => "ai_title_generation",
            Feature::GeminiVideoAnalysis => "gemini_video_analysis",
            Feature::AutoUpload => "auto_upload",
            Feature::PriorityQueue => "priority_queue",
            Feature::ApiAccess => "api_access",
            Feature::CustomTemplate => "custom_template",
            Feature::DataExport => "data_export",
            Feature::TeamCollaboration => "team_collaboration",
        }
    }

    /// Resolves a feature by its wire name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Feature> {
        FEATURES_BY_NAME.get(name).copied()
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Feature::AiTranslation => "AI subtitle translation",
            Feature::TranslationOptimize => "Translation quality optimization",
            Feature::AiTitleGeneration => "AI title generation",
            Feature::GeminiVideoAnalysis => "Gemini video analysis",
            Feature::AutoUpload => "Automatic upload",
            Feature::PriorityQueue => "Priority queue",
            Feature::ApiAccess => "API access",
            Feature::CustomTemplate => "Custom templates",
            Feature::DataExport => "Data export",
            Feature::TeamCollaboration => "Team collaboration",
        }
    }

    /// Lowest tier whose catalog entry enables this feature.
    pub fn minimum_tier(&self) -> MembershipTier {
        TierConfig::all()
            .iter()
            .find(|c| c.features.is_enabled(*self))
            .map(|c| c.tier)
            .unwrap_or(MembershipTier::Enterprise)
    }

    /// User-facing explanation for a denial of this feature.
    pub fn denial_message(&self) -> String {
        format!(
            "{} requires a {} membership or higher.",
            self.display_name(),
            self.minimum_tier().display_name()
        )
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
