//! QuotaService - daily quota reporting and atomic video consumption.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::foundation::{UsageDate, UserId};
use crate::domain::membership::{CheckResult, MembershipError, MembershipTier};
use crate::ports::MembershipStore;

use super::FeatureChecker;

/// Quota position for a user today.
///
/// `None` limits and remainders mean unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaInfo {
    pub tier: MembershipTier,
    pub daily_limit: Option<u32>,
    pub daily_used: i64,
    pub daily_remaining: Option<i64>,
    pub boost_remaining: i64,
    pub total_remaining: Option<i64>,
    pub is_unlimited: bool,
}

/// Where a consumed video was charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Consumption {
    /// Unlimited tier; nothing recorded.
    Unlimited,
    /// Charged to today's quota; `used` is the new count.
    Daily { used: i64, limit: u32 },
    /// Charged to the boost pack; `remaining` is the new balance.
    Boost { remaining: i64 },
}

#[derive(Clone)]
pub struct QuotaService {
    store: Arc<dyn MembershipStore>,
    checker: FeatureChecker,
}

impl QuotaService {
    pub fn new(store: Arc<dyn MembershipStore>, checker: FeatureChecker) -> Self {
        Self { store, checker }
    }

    pub async fn get_quota_info(&self, user_id: &UserId) -> Result<QuotaInfo, MembershipError> {
        let tier = self.checker.effective_tier(user_id).await?;
        let daily_limit = tier.config().limits.videos_per_day;
        let daily_used = self
            .store
            .get_daily_usage(user_id, UsageDate::today())
            .await?;
        let boost_remaining = self.store.get_boost_pack(user_id).await?.available_videos();

        let daily_remaining =
            daily_limit.map(|limit| (i64::from(limit) - daily_used).max(0));

        Ok(QuotaInfo {
            tier,
            daily_limit,
            daily_used,
            daily_remaining,
            boost_remaining,
            total_remaining: daily_remaining.map(|daily| daily + boost_remaining),
            is_unlimited: daily_limit.is_none(),
        })
    }

    /// Consume one video.
    ///
    /// Daily quota is charged first, then the boost pack. The charge itself
    /// is a single conditional store operation, so concurrent callers can
    /// never exceed the limit plus the pack balance.
    ///
    /// # Errors
    ///
    /// - `QuotaExceeded` when both daily quota and boost pack are exhausted
    /// - `StoreUnavailable` if the store cannot answer
    pub async fn consume_quota(&self, user_id: &UserId) -> Result<Consumption, MembershipError> {
        let check = self.checker.can_process_video(user_id).await?;

        let tier = self.checker.effective_tier(user_id).await?;
        let Some(limit) = tier.config().limits.videos_per_day else {
            debug!(user_id = %user_id, tier = %tier, "Unlimited tier, nothing to consume");
            return Ok(Consumption::Unlimited);
        };

        if !check.allowed {
            return Err(MembershipError::quota_exceeded(i64::from(limit), limit));
        }

        let today = UsageDate::today();
        if let Some(used) = self
            .store
            .incr_daily_usage_within(user_id, today, limit)
            .await?
        {
            debug!(user_id = %user_id, used = used, limit = limit, "Charged daily quota");
            return Ok(Consumption::Daily { used, limit });
        }

        match self.store.decr_boost_pack(user_id).await {
            Ok(pack) => {
                info!(
                    user_id = %user_id,
                    remaining = pack.videos_remaining,
                    "Charged boost pack"
                );
                Ok(Consumption::Boost {
                    remaining: pack.videos_remaining,
                })
            }
            Err(MembershipError::InvalidPack(_)) => {
                Err(MembershipError::quota_exceeded(i64::from(limit), limit))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn has_quota(&self, user_id: &UserId) -> Result<bool, MembershipError> {
        Ok(self.checker.can_process_video(user_id).await?.allowed)
    }

    /// Maximum batch size for the user; the free limit when the store
    /// cannot answer.
    pub async fn batch_limit(&self, user_id: &UserId) -> u32 {
        self.checker
            .get_user_tier(user_id)
            .await
            .config()
            .limits
            .batch_size
    }

    pub async fn can_batch(&self, user_id: &UserId, count: u32) -> Result<CheckResult, MembershipError> {
        self.checker.can_batch_submit(user_id, count).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryMembershipStore;
    use crate::domain::foundation::Timestamp;
    use crate::domain::membership::BoostPack;

    fn test_user_id() -> UserId {
        UserId::new("quota-user").unwrap()
    }

    fn setup() -> (InMemoryMembershipStore, QuotaService) {
        let store = InMemoryMembershipStore::new();
        let shared: Arc<dyn MembershipStore> = Arc::new(store.clone());
        let service = QuotaService::new(shared.clone(), FeatureChecker::new(shared));
        (store, service)
    }

    fn pack(videos: i64) -> BoostPack {
        BoostPack {
            user_id: test_user_id(),
            videos_remaining: videos,
            expires_at: Some(Timestamp::now().add_days(3)),
            last_purchase_at: Some(Timestamp::now()),
        }
    }

    #[tokio::test]
    async fn quota_info_for_fresh_free_user() {
        let (_, service) = setup();

        let info = service.get_quota_info(&test_user_id()).await.unwrap();
        assert_eq!(info.tier, MembershipTier::Free);
        assert_eq!(info.daily_limit, Some(5));
        assert_eq!(info.daily_used, 0);
        assert_eq!(info.daily_remaining, Some(5));
        assert_eq!(info.boost_remaining, 0);
        assert_eq!(info.total_remaining, Some(5));
        assert!(!info.is_unlimited);
    }

    #[tokio::test]
    async fn quota_info_counts_boost_and_clamps_daily() {
        let (store, service) = setup();
        store
            .set_daily_usage(&test_user_id(), UsageDate::today(), 7)
            .await;
        store.set_boost_pack(pack(4)).await;

        let info = service.get_quota_info(&test_user_id()).await.unwrap();
        assert_eq!(info.daily_remaining, Some(0));
        assert_eq!(info.boost_remaining, 4);
        assert_eq!(info.total_remaining, Some(4));
    }

    #[tokio::test]
    async fn quota_info_for_unlimited_tier() {
        let (store, service) = setup();
        store.set_tier(&test_user_id(), MembershipTier::Enterprise).await;

        let info = service.get_quota_info(&test_user_id()).await.unwrap();
        assert!(info.is_unlimited);
        assert_eq!(info.daily_limit, None);
        assert_eq!(info.total_remaining, None);
    }

    #[tokio::test]
    async fn consume_charges_daily_then_boost_then_fails() {
        let (store, service) = setup();
        store.set_boost_pack(pack(2)).await;

        for expected in 1..=5 {
            let outcome = service.consume_quota(&test_user_id()).await.unwrap();
            assert_eq!(outcome, Consumption::Daily { used: expected, limit: 5 });
        }
        assert_eq!(
            service.consume_quota(&test_user_id()).await.unwrap(),
            Consumption::Boost { remaining: 1 }
        );
        assert_eq!(
            service.consume_quota(&test_user_id()).await.unwrap(),
            Consumption::Boost { remaining: 0 }
        );

        let err = service.consume_quota(&test_user_id()).await.unwrap_err();
        assert!(matches!(err, MembershipError::QuotaExceeded { used: 5, limit: 5 }));
        assert!(!service.has_quota(&test_user_id()).await.unwrap());
    }

    #[tokio::test]
    async fn consume_on_unlimited_tier_records_nothing() {
        let (store, service) = setup();
        store.set_tier(&test_user_id(), MembershipTier::Enterprise).await;

        assert_eq!(
            service.consume_quota(&test_user_id()).await.unwrap(),
            Consumption::Unlimited
        );
        let info = service.get_quota_info(&test_user_id()).await.unwrap();
        assert_eq!(info.daily_used, 0);
    }

    #[tokio::test]
    async fn consume_ignores_expired_boost_pack() {
        let (store, service) = setup();
        store
            .set_daily_usage(&test_user_id(), UsageDate::today(), 5)
            .await;
        store
            .set_boost_pack(BoostPack {
                expires_at: Some(Timestamp::now().minus_days(1)),
                ..pack(10)
            })
            .await;

        let err = service.consume_quota(&test_user_id()).await.unwrap_err();
        assert!(matches!(err, MembershipError::QuotaExceeded { .. }));
    }

    #[tokio::test]
    async fn consume_propagates_store_failure() {
        let (store, service) = setup();
        store.set_unavailable(true);

        let err = service.consume_quota(&test_user_id()).await.unwrap_err();
        assert!(matches!(err, MembershipError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn batch_limit_follows_tier_and_falls_back_to_free() {
        let (store, service) = setup();
        store.set_tier(&test_user_id(), MembershipTier::Pro).await;
        assert_eq!(service.batch_limit(&test_user_id()).await, 20);
        assert!(service.can_batch(&test_user_id(), 20).await.unwrap().allowed);
        assert!(!service.can_batch(&test_user_id(), 21).await.unwrap().allowed);

        store.set_unavailable(true);
        assert_eq!(service.batch_limit(&test_user_id()).await, 1);
    }
}
