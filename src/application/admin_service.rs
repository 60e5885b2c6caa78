//! AdminService - operator overrides for tiers and boost packs.

use std::sync::Arc;
use tracing::info;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::membership::{BoostPack, MembershipError, MembershipTier, UserMembership};
use crate::ports::MembershipStore;

#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn MembershipStore>,
}

impl AdminService {
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self { store }
    }

    /// Set a user's tier, valid for `valid_days` or open-ended when None.
    ///
    /// The free tier never carries an expiry. `created_at` and the
    /// subscription reference of the existing record are kept.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if `valid_days` is zero
    /// - `NotFound` if the durable store has no such user
    pub async fn set_tier(
        &self,
        user_id: &UserId,
        tier: MembershipTier,
        valid_days: Option<u32>,
    ) -> Result<UserMembership, MembershipError> {
        if valid_days == Some(0) {
            return Err(MembershipError::validation("valid_days", "must be at least 1"));
        }

        let existing = self.store.get_membership(user_id).await?;
        let now = Timestamp::now();
        let expires_at = match (tier, valid_days) {
            (MembershipTier::Free, _) => None,
            (_, days) => days.map(|d| now.add_days(i64::from(d))),
        };

        let membership = UserMembership {
            user_id: user_id.clone(),
            tier,
            expires_at,
            subscription_id: existing.subscription_id,
            created_at: existing.created_at,
            updated_at: now,
        };
        self.store.save_membership(&membership).await?;

        info!(
            user_id = %user_id,
            previous_tier = %existing.tier,
            tier = %tier,
            expires_at = ?expires_at,
            "Membership tier set by admin"
        );
        Ok(membership)
    }

    /// Replace a user's boost pack with `videos` valid for `valid_days`.
    pub async fn grant_boost_pack(
        &self,
        user_id: &UserId,
        videos: i64,
        valid_days: i64,
    ) -> Result<BoostPack, MembershipError> {
        if videos < 1 {
            return Err(MembershipError::validation("videos", "must be at least 1"));
        }
        if valid_days < 1 {
            return Err(MembershipError::validation("valid_days", "must be at least 1"));
        }

        let now = Timestamp::now();
        let pack = BoostPack {
            user_id: user_id.clone(),
            videos_remaining: videos,
            expires_at: Some(now.add_days(valid_days)),
            last_purchase_at: Some(now),
        };
        self.store.save_boost_pack(&pack).await?;

        info!(
            user_id = %user_id,
            videos = videos,
            valid_days = valid_days,
            "Boost pack granted by admin"
        );
        Ok(pack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryMembershipStore;

    fn test_user_id() -> UserId {
        UserId::new("admin-target").unwrap()
    }

    fn setup() -> (InMemoryMembershipStore, AdminService) {
        let store = InMemoryMembershipStore::new();
        let service = AdminService::new(Arc::new(store.clone()));
        (store, service)
    }

    #[tokio::test]
    async fn set_tier_with_days_sets_expiry() {
        let (store, service) = setup();

        let membership = service
            .set_tier(&test_user_id(), MembershipTier::Pro, Some(30))
            .await
            .unwrap();
        assert_eq!(membership.tier, MembershipTier::Pro);
        assert_eq!(membership.days_until_expiry(), Some(29));
        assert!(store.has_membership(&test_user_id()).await);
    }

    #[tokio::test]
    async fn set_tier_without_days_is_open_ended() {
        let (_, service) = setup();

        let membership = service
            .set_tier(&test_user_id(), MembershipTier::Basic, None)
            .await
            .unwrap();
        assert_eq!(membership.expires_at, None);
        assert_eq!(membership.effective_tier(), MembershipTier::Basic);
    }

    #[tokio::test]
    async fn set_tier_preserves_created_at() {
        let (store, service) = setup();
        store.set_tier(&test_user_id(), MembershipTier::Basic).await;
        let first = store.get_membership(&test_user_id()).await.unwrap();

        let updated = service
            .set_tier(&test_user_id(), MembershipTier::Enterprise, Some(365))
            .await
            .unwrap();
        assert_eq!(updated.created_at, first.created_at);
    }

    #[tokio::test]
    async fn free_tier_drops_expiry() {
        let (_, service) = setup();

        let membership = service
            .set_tier(&test_user_id(), MembershipTier::Free, Some(10))
            .await
            .unwrap();
        assert_eq!(membership.expires_at, None);
    }

    #[tokio::test]
    async fn zero_days_is_rejected() {
        let (_, service) = setup();

        let err = service
            .set_tier(&test_user_id(), MembershipTier::Pro, Some(0))
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::ValidationFailed { .. }));
    }

    #[tokio::test]
    async fn set_tier_for_unknown_user_fails_on_strict_store() {
        let store = InMemoryMembershipStore::requiring_users();
        let service = AdminService::new(Arc::new(store));

        let err = service
            .set_tier(&test_user_id(), MembershipTier::Pro, None)
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::NotFound(_)));
    }

    #[tokio::test]
    async fn grant_replaces_existing_pack() {
        let (store, service) = setup();
        store
            .set_boost_pack(BoostPack {
                user_id: test_user_id(),
                videos_remaining: 50,
                expires_at: Some(Timestamp::now().add_days(20)),
                last_purchase_at: None,
            })
            .await;

        let pack = service.grant_boost_pack(&test_user_id(), 5, 2).await.unwrap();
        assert_eq!(pack.videos_remaining, 5);

        let stored = store.get_boost_pack(&test_user_id()).await.unwrap();
        assert_eq!(stored.videos_remaining, 5);
        assert_eq!(stored.days_until_expiry(), 1);
    }

    #[tokio::test]
    async fn grant_rejects_non_positive_values() {
        let (_, service) = setup();

        assert!(service.grant_boost_pack(&test_user_id(), 0, 7).await.is_err());
        assert!(service.grant_boost_pack(&test_user_id(), 10, 0).await.is_err());
    }
}
