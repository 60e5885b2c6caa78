//! FeatureChecker - capability questions answered from the effective tier.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::foundation::{ErrorCode, Timestamp, UsageDate, UserId};
use crate::domain::membership::{
    CheckResult, Feature, MembershipError, MembershipTier, UserMembership,
};
use crate::ports::MembershipStore;

/// Snapshot of a user's membership for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipSummary {
    pub user_id: UserId,
    /// Tier after expiry is applied.
    pub tier: MembershipTier,
    /// Tier as stored.
    pub stored_tier: MembershipTier,
    pub display_name: &'static str,
    pub expires_at: Option<Timestamp>,
    pub days_remaining: Option<i64>,
    pub is_expired: bool,
    /// None = unlimited.
    pub daily_limit: Option<u32>,
    pub batch_limit: u32,
    pub priority: u8,
    pub subscription_id: Option<String>,
}

impl MembershipSummary {
    fn from_membership(membership: UserMembership) -> Self {
        let tier = membership.effective_tier();
        let config = tier.config();
        Self {
            tier,
            stored_tier: membership.tier,
            display_name: config.name,
            expires_at: membership.expires_at,
            days_remaining: membership.days_until_expiry(),
            is_expired: membership.is_expired(),
            daily_limit: config.limits.videos_per_day,
            batch_limit: config.limits.batch_size,
            priority: config.priority,
            subscription_id: membership.subscription_id.clone(),
            user_id: membership.user_id,
        }
    }
}

/// Answers whether a user may use a feature, process a video or submit a
/// batch.
///
/// Denials are `CheckResult` values; `Err` means the store could not answer.
#[derive(Clone)]
pub struct FeatureChecker {
    store: Arc<dyn MembershipStore>,
    allow_unknown_features: bool,
}

impl FeatureChecker {
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self {
            store,
            allow_unknown_features: true,
        }
    }

    /// Whether feature names missing from the catalog are allowed.
    pub fn with_unknown_features(mut self, allow: bool) -> Self {
        self.allow_unknown_features = allow;
        self
    }

    /// Effective tier, propagating storage failures.
    pub async fn effective_tier(&self, user_id: &UserId) -> Result<MembershipTier, MembershipError> {
        Ok(self.store.get_membership(user_id).await?.effective_tier())
    }

    pub async fn can_use_feature(
        &self,
        user_id: &UserId,
        feature_name: &str,
    ) -> Result<CheckResult, MembershipError> {
        let tier = self.effective_tier(user_id).await?;

        let Some(feature) = Feature::from_name(feature_name) else {
            if self.allow_unknown_features {
                debug!(user_id = %user_id, feature = feature_name, "Unknown feature allowed");
                return Ok(CheckResult::allowed());
            }
            return Ok(CheckResult::denied(
                ErrorCode::FeatureNotAllowed,
                format!("Unknown feature: {}", feature_name),
                None,
            ));
        };

        if tier.config().features.is_enabled(feature) {
            Ok(CheckResult::allowed())
        } else {
            Ok(CheckResult::denied(
                ErrorCode::FeatureNotAllowed,
                feature.denial_message(),
                tier.next_higher(),
            ))
        }
    }

    /// Allowed while daily quota remains or a valid boost pack exists.
    pub async fn can_process_video(&self, user_id: &UserId) -> Result<CheckResult, MembershipError> {
        let tier = self.effective_tier(user_id).await?;
        let Some(limit) = tier.config().limits.videos_per_day else {
            return Ok(CheckResult::allowed());
        };

        let used = self
            .store
            .get_daily_usage(user_id, UsageDate::today())
            .await?;
        if used < i64::from(limit) {
            return Ok(CheckResult::allowed());
        }

        if self.store.get_boost_pack(user_id).await?.is_valid() {
            return Ok(CheckResult::allowed());
        }

        Ok(CheckResult::denied(
            ErrorCode::QuotaExceeded,
            format!(
                "Daily limit of {} videos reached and no valid boost pack. \
                 Upgrade your membership or buy a boost pack.",
                limit
            ),
            tier.next_higher(),
        ))
    }

    pub async fn can_batch_submit(
        &self,
        user_id: &UserId,
        count: u32,
    ) -> Result<CheckResult, MembershipError> {
        let tier = self.effective_tier(user_id).await?;
        let max = tier.config().limits.batch_size;

        if count > max {
            return Ok(CheckResult::denied(
                ErrorCode::BatchSizeExceeded,
                format!(
                    "{} membership allows batches of up to {} videos, got {}.",
                    tier.display_name(),
                    max,
                    count
                ),
                tier.next_higher(),
            ));
        }
        Ok(CheckResult::allowed())
    }

    /// Queue priority for the user; 0 when the store cannot answer.
    pub async fn get_user_priority(&self, user_id: &UserId) -> u8 {
        match self.effective_tier(user_id).await {
            Ok(tier) => tier.priority(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Priority lookup failed, using default");
                0
            }
        }
    }

    /// Effective tier; `Free` when the store cannot answer.
    pub async fn get_user_tier(&self, user_id: &UserId) -> MembershipTier {
        match self.effective_tier(user_id).await {
            Ok(tier) => tier,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Tier lookup failed, using free");
                MembershipTier::Free
            }
        }
    }

    /// Features enabled for the effective tier, in catalog order.
    pub async fn available_features(&self, user_id: &UserId) -> Result<Vec<Feature>, MembershipError> {
        Ok(self.effective_tier(user_id).await?.config().features.enabled())
    }

    pub async fn membership_summary(
        &self,
        user_id: &UserId,
    ) -> Result<MembershipSummary, MembershipError> {
        let membership = self.store.get_membership(user_id).await?;
        Ok(MembershipSummary::from_membership(membership))
    }
}
