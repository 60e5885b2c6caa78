//! Cache-aside composition of a durable store and a cache store.
//!
//! | Operation | Path |
//! |-----------|------|
//! | membership / boost read | cache, then durable on miss; refill cache in background |
//! | daily usage read | cache, then durable when the cache says 0 |
//! | membership / boost write | durable, then cache |
//! | daily usage increment | cache, durable on cache failure; durable floor every Nth |
//! | boost decrement | durable atomic decrement, then reconcile cache |
//!
//! The durable store is authoritative. Cache failures are logged and
//! swallowed wherever a durable path exists; durable failures surface.
//!
//! Boost pack cache writes that follow a durable read or decrement go
//! through `merge_boost_pack`, so a write that lands late cannot raise the
//! cached balance above a newer one. Empty packs are written outright since
//! readers treat them as a miss.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::foundation::{UsageDate, UserId};
use crate::domain::membership::{BoostPack, MembershipError, UserMembership};
use crate::ports::MembershipStore;

/// Background task tuning for the hybrid store.
#[derive(Debug, Clone)]
pub struct HybridSettings {
    /// Mirror the cached counter to the durable store every Nth increment.
    pub usage_sync_every: u32,
    /// Bound on a background cache refill.
    pub cache_refresh_timeout: Duration,
    /// Bound on a background durable usage sync.
    pub usage_sync_timeout: Duration,
}

impl Default for HybridSettings {
    fn default() -> Self {
        Self {
            usage_sync_every: 10,
            cache_refresh_timeout: Duration::from_secs(2),
            usage_sync_timeout: Duration::from_secs(5),
        }
    }
}

/// Durable store fronted by a cache store.
#[derive(Clone)]
pub struct HybridMembershipStore {
    durable: Arc<dyn MembershipStore>,
    cache: Arc<dyn MembershipStore>,
    settings: HybridSettings,
}

impl HybridMembershipStore {
    pub fn new(
        durable: Arc<dyn MembershipStore>,
        cache: Arc<dyn MembershipStore>,
        settings: HybridSettings,
    ) -> Self {
        Self {
            durable,
            cache,
            settings,
        }
    }

    /// Whether the `count`th increment of a day triggers a durable sync.
    fn is_sync_point(&self, count: i64) -> bool {
        let every = i64::from(self.settings.usage_sync_every.max(1));
        count > 0 && count % every == 0
    }

    fn refresh_membership(&self, membership: UserMembership) {
        let cache = Arc::clone(&self.cache);
        let limit = self.settings.cache_refresh_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(limit, cache.save_membership(&membership)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(user_id = %membership.user_id, error = %e, "Membership cache refill failed")
                }
                Err(_) => warn!(user_id = %membership.user_id, "Membership cache refill timed out"),
            }
        });
    }

    fn refresh_boost_pack(&self, pack: BoostPack) {
        let cache = Arc::clone(&self.cache);
        let limit = self.settings.cache_refresh_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(limit, cache.merge_boost_pack(&pack)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(user_id = %pack.user_id, error = %e, "Boost pack cache refill failed")
                }
                Err(_) => warn!(user_id = %pack.user_id, "Boost pack cache refill timed out"),
            }
        });
    }

    /// Bring the cached pack in line with `pack` read from the durable store.
    async fn reconcile_boost_pack(&self, pack: &BoostPack) {
        let result = if pack.videos_remaining > 0 {
            self.cache.merge_boost_pack(pack).await
        } else {
            self.cache.save_boost_pack(pack).await
        };
        if let Err(e) = result {
            warn!(user_id = %pack.user_id, error = %e, "Boost pack cache update failed");
        }
    }

    fn sync_usage_in_background(&self, user_id: &UserId, date: UsageDate, count: i64) {
        let durable = Arc::clone(&self.durable);
        let limit = self.settings.usage_sync_timeout;
        let user_id = user_id.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(limit, durable.sync_daily_usage(&user_id, date, count)).await
            {
                Ok(Ok(())) => debug!(user_id = %user_id, date = %date, count, "Usage synced"),
                Ok(Err(e)) => warn!(user_id = %user_id, error = %e, "Usage sync failed"),
                Err(_) => warn!(user_id = %user_id, "Usage sync timed out"),
            }
        });
    }

    /// Raises an empty cached counter to the durable floor.
    ///
    /// Returns false when the cache cannot be used for this increment.
    async fn seed_usage(&self, user_id: &UserId, date: UsageDate) -> Result<bool, MembershipError> {
        match self.cache.get_daily_usage(user_id, date).await {
            Ok(0) => {}
            Ok(_) => return Ok(true),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Usage cache read failed, using durable store");
                return Ok(false);
            }
        }

        let floor = self.durable.get_daily_usage(user_id, date).await?;
        if floor > 0 {
            if let Err(e) = self.cache.sync_daily_usage(user_id, date, floor).await {
                warn!(user_id = %user_id, error = %e, "Usage cache seed failed, using durable store");
                return Ok(false);
            }
            debug!(user_id = %user_id, date = %date, floor, "Usage cache seeded from durable store");
        }
        Ok(true)
    }
}

#[async_trait]
impl MembershipStore for HybridMembershipStore {
    async fn get_membership(&self, user_id: &UserId) -> Result<UserMembership, MembershipError> {
        match self.cache.get_membership(user_id).await {
            Ok(m) if !m.is_default() => return Ok(m),
            Ok(_) => debug!(user_id = %user_id, "Membership cache miss"),
            Err(e) => warn!(user_id = %user_id, error = %e, "Membership cache read failed"),
        }

        let membership = self.durable.get_membership(user_id).await?;
        if !membership.is_default() {
            self.refresh_membership(membership.clone());
        }
        Ok(membership)
    }

    async fn save_membership(&self, membership: &UserMembership) -> Result<(), MembershipError> {
        self.durable.save_membership(membership).await?;

        if let Err(e) = self.cache.save_membership(membership).await {
            warn!(user_id = %membership.user_id, error = %e, "Membership cache write failed");
        }
        Ok(())
    }

    async fn get_daily_usage(
        &self,
        user_id: &UserId,
        date: UsageDate,
    ) -> Result<i64, MembershipError> {
        match self.cache.get_daily_usage(user_id, date).await {
            Ok(count) if count > 0 => return Ok(count),
            Ok(_) => {}
            Err(e) => warn!(user_id = %user_id, error = %e, "Usage cache read failed"),
        }
        self.durable.get_daily_usage(user_id, date).await
    }

    async fn incr_daily_usage(
        &self,
        user_id: &UserId,
        date: UsageDate,
    ) -> Result<i64, MembershipError> {
        if self.seed_usage(user_id, date).await? {
            match self.cache.incr_daily_usage(user_id, date).await {
                Ok(count) => {
                    if self.is_sync_point(count) {
                        self.sync_usage_in_background(user_id, date, count);
                    }
                    return Ok(count);
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "Usage cache increment failed, using durable store")
                }
            }
        }
        self.durable.incr_daily_usage(user_id, date).await
    }

    async fn incr_daily_usage_within(
        &self,
        user_id: &UserId,
        date: UsageDate,
        limit: u32,
    ) -> Result<Option<i64>, MembershipError> {
        if self.seed_usage(user_id, date).await? {
            match self.cache.incr_daily_usage_within(user_id, date, limit).await {
                Ok(result) => {
                    if let Some(count) = result {
                        if self.is_sync_point(count) {
                            self.sync_usage_in_background(user_id, date, count);
                        }
                    }
                    return Ok(result);
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "Usage cache increment failed, using durable store")
                }
            }
        }
        self.durable
            .incr_daily_usage_within(user_id, date, limit)
            .await
    }

    async fn sync_daily_usage(
        &self,
        user_id: &UserId,
        date: UsageDate,
        count: i64,
    ) -> Result<(), MembershipError> {
        self.durable.sync_daily_usage(user_id, date, count).await?;

        if let Err(e) = self.cache.sync_daily_usage(user_id, date, count).await {
            warn!(user_id = %user_id, error = %e, "Usage cache sync failed");
        }
        Ok(())
    }

    async fn get_boost_pack(&self, user_id: &UserId) -> Result<BoostPack, MembershipError> {
        match self.cache.get_boost_pack(user_id).await {
            Ok(pack) if pack.videos_remaining > 0 => return Ok(pack),
            Ok(_) => debug!(user_id = %user_id, "Boost pack cache miss"),
            Err(e) => warn!(user_id = %user_id, error = %e, "Boost pack cache read failed"),
        }

        let pack = self.durable.get_boost_pack(user_id).await?;
        if pack.videos_remaining > 0 {
            self.refresh_boost_pack(pack.clone());
        }
        Ok(pack)
    }

    async fn save_boost_pack(&self, pack: &BoostPack) -> Result<(), MembershipError> {
        self.durable.save_boost_pack(pack).await?;

        if let Err(e) = self.cache.save_boost_pack(pack).await {
            warn!(user_id = %pack.user_id, error = %e, "Boost pack cache write failed");
        }
        Ok(())
    }

    async fn merge_boost_pack(&self, pack: &BoostPack) -> Result<(), MembershipError> {
        self.durable.merge_boost_pack(pack).await?;

        if let Err(e) = self.cache.merge_boost_pack(pack).await {
            warn!(user_id = %pack.user_id, error = %e, "Boost pack cache merge failed");
        }
        Ok(())
    }

    async fn decr_boost_pack(&self, user_id: &UserId) -> Result<BoostPack, MembershipError> {
        match self.durable.decr_boost_pack(user_id).await {
            Ok(pack) => {
                self.reconcile_boost_pack(&pack).await;
                Ok(pack)
            }
            Err(err @ MembershipError::InvalidPack(_)) => {
                // the cache may still advertise videos the durable store refused
                match self.durable.get_boost_pack(user_id).await {
                    Ok(current) => self.reconcile_boost_pack(&current).await,
                    Err(e) => warn!(user_id = %user_id, error = %e, "Boost pack reload failed"),
                }
                Err(err)
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for HybridMembershipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridMembershipStore")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryMembershipStore;
    use crate::domain::foundation::Timestamp;
    use crate::domain::membership::MembershipTier;

    // ════════════════════════════════════════════════════════════════════════
    // Fixtures
    // ════════════════════════════════════════════════════════════════════════

    struct Fixture {
        durable: InMemoryMembershipStore,
        cache: InMemoryMembershipStore,
        store: HybridMembershipStore,
    }

    fn fixture_with(settings: HybridSettings) -> Fixture {
        let durable = InMemoryMembershipStore::new();
        let cache = InMemoryMembershipStore::new();
        let store = HybridMembershipStore::new(
            Arc::new(durable.clone()),
            Arc::new(cache.clone()),
            settings,
        );
        Fixture {
            durable,
            cache,
            store,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(HybridSettings::default())
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn valid_pack(videos: i64) -> BoostPack {
        BoostPack {
            user_id: user(),
            videos_remaining: videos,
            expires_at: Some(Timestamp::now().add_days(7)),
            last_purchase_at: Some(Timestamp::now()),
        }
    }

    /// Cache whose writes of a one-video balance land late.
    struct SlowCache {
        inner: InMemoryMembershipStore,
        delay: Duration,
    }

    impl SlowCache {
        async fn hold_back(&self, pack: &BoostPack) {
            if pack.videos_remaining == 1 {
                tokio::time::sleep(self.delay).await;
            }
        }
    }

    #[async_trait]
    impl MembershipStore for SlowCache {
        async fn get_membership(&self, user_id: &UserId) -> Result<UserMembership, MembershipError> {
            self.inner.get_membership(user_id).await
        }

        async fn save_membership(&self, membership: &UserMembership) -> Result<(), MembershipError> {
            self.inner.save_membership(membership).await
        }

        async fn get_daily_usage(
            &self,
            user_id: &UserId,
            date: UsageDate,
        ) -> Result<i64, MembershipError> {
            self.inner.get_daily_usage(user_id, date).await
        }

        async fn incr_daily_usage(
            &self,
            user_id: &UserId,
            date: UsageDate,
        ) -> Result<i64, MembershipError> {
            self.inner.incr_daily_usage(user_id, date).await
        }

        async fn incr_daily_usage_within(
            &self,
            user_id: &UserId,
            date: UsageDate,
            limit: u32,
        ) -> Result<Option<i64>, MembershipError> {
            self.inner.incr_daily_usage_within(user_id, date, limit).await
        }

        async fn sync_daily_usage(
            &self,
            user_id: &UserId,
            date: UsageDate,
            count: i64,
        ) -> Result<(), MembershipError> {
            self.inner.sync_daily_usage(user_id, date, count).await
        }

        async fn get_boost_pack(&self, user_id: &UserId) -> Result<BoostPack, MembershipError> {
            self.inner.get_boost_pack(user_id).await
        }

        async fn save_boost_pack(&self, pack: &BoostPack) -> Result<(), MembershipError> {
            self.hold_back(pack).await;
            self.inner.save_boost_pack(pack).await
        }

        async fn merge_boost_pack(&self, pack: &BoostPack) -> Result<(), MembershipError> {
            self.hold_back(pack).await;
            self.inner.merge_boost_pack(pack).await
        }

        async fn decr_boost_pack(&self, user_id: &UserId) -> Result<BoostPack, MembershipError> {
            self.inner.decr_boost_pack(user_id).await
        }
    }

    /// Polls until `check` holds; background tasks land asynchronously.
    async fn eventually<F, Fut>(mut check: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..100 {
            if check().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    // ════════════════════════════════════════════════════════════════════════
    // Membership reads and writes
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn cache_hit_is_served_from_cache() {
        let f = fixture();
        f.cache.set_tier(&user(), MembershipTier::Pro).await;

        let m = f.store.get_membership(&user()).await.unwrap();
        assert_eq!(m.tier, MembershipTier::Pro);
        assert!(!f.durable.has_membership(&user()).await);
    }

    #[tokio::test]
    async fn degenerate_cache_value_falls_through_and_refills() {
        let f = fixture();
        f.durable.set_tier(&user(), MembershipTier::Basic).await;

        let m = f.store.get_membership(&user()).await.unwrap();
        assert_eq!(m.tier, MembershipTier::Basic);

        let cache = f.cache.clone();
        assert!(
            eventually(|| {
                let cache = cache.clone();
                async move { cache.has_membership(&user()).await }
            })
            .await
        );
    }

    #[tokio::test]
    async fn default_membership_is_not_cached() {
        let f = fixture();
        let m = f.store.get_membership(&user()).await.unwrap();
        assert_eq!(m.tier, MembershipTier::Free);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!f.cache.has_membership(&user()).await);
    }

    #[tokio::test]
    async fn cache_outage_falls_back_to_durable() {
        let f = fixture();
        f.durable.set_tier(&user(), MembershipTier::Enterprise).await;
        f.cache.set_unavailable(true);

        let m = f.store.get_membership(&user()).await.unwrap();
        assert_eq!(m.tier, MembershipTier::Enterprise);
    }

    #[tokio::test]
    async fn durable_outage_surfaces() {
        let f = fixture();
        f.durable.set_unavailable(true);

        let err = f.store.get_membership(&user()).await.unwrap_err();
        assert!(matches!(err, MembershipError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn save_writes_durable_then_cache() {
        let f = fixture();
        let m = UserMembership::with_tier(user(), MembershipTier::Pro, None);

        f.store.save_membership(&m).await.unwrap();
        assert!(f.durable.has_membership(&user()).await);
        assert!(f.cache.has_membership(&user()).await);
    }

    #[tokio::test]
    async fn failed_durable_save_leaves_cache_untouched() {
        let f = fixture();
        f.durable.set_unavailable(true);
        let m = UserMembership::with_tier(user(), MembershipTier::Pro, None);

        assert!(f.store.save_membership(&m).await.is_err());
        assert!(!f.cache.has_membership(&user()).await);
    }

    #[tokio::test]
    async fn save_succeeds_when_cache_is_down() {
        let f = fixture();
        f.cache.set_unavailable(true);
        let m = UserMembership::with_tier(user(), MembershipTier::Basic, None);

        f.store.save_membership(&m).await.unwrap();
        assert_eq!(
            f.durable.get_membership(&user()).await.unwrap().tier,
            MembershipTier::Basic
        );
    }

    // ════════════════════════════════════════════════════════════════════════
    // Daily usage
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn zero_in_cache_reads_durable() {
        let f = fixture();
        let today = UsageDate::today();
        f.durable.set_daily_usage(&user(), today, 4).await;

        assert_eq!(f.store.get_daily_usage(&user(), today).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn increment_goes_to_cache() {
        let f = fixture();
        let today = UsageDate::today();

        assert_eq!(f.store.incr_daily_usage(&user(), today).await.unwrap(), 1);
        assert_eq!(f.cache.get_daily_usage(&user(), today).await.unwrap(), 1);
        assert_eq!(f.durable.get_daily_usage(&user(), today).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn increment_falls_back_to_durable_when_cache_is_down() {
        let f = fixture();
        let today = UsageDate::today();
        f.cache.set_unavailable(true);

        assert_eq!(f.store.incr_daily_usage(&user(), today).await.unwrap(), 1);
        assert_eq!(f.durable.get_daily_usage(&user(), today).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn every_nth_increment_syncs_durable_floor() {
        let f = fixture_with(HybridSettings {
            usage_sync_every: 3,
            ..Default::default()
        });
        let today = UsageDate::today();

        f.store.incr_daily_usage(&user(), today).await.unwrap();
        f.store.incr_daily_usage(&user(), today).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(f.durable.get_daily_usage(&user(), today).await.unwrap(), 0);

        f.store.incr_daily_usage(&user(), today).await.unwrap();
        let durable = f.durable.clone();
        assert!(
            eventually(|| {
                let durable = durable.clone();
                async move { durable.get_daily_usage(&user(), today).await.unwrap() == 3 }
            })
            .await
        );
    }

    #[tokio::test]
    async fn capped_increment_resumes_from_durable_floor() {
        let f = fixture();
        let today = UsageDate::today();
        // cache lost its counter; durable still holds the synced floor
        f.durable.set_daily_usage(&user(), today, 4).await;

        assert_eq!(
            f.store.incr_daily_usage_within(&user(), today, 5).await.unwrap(),
            Some(5)
        );
        assert_eq!(
            f.store.incr_daily_usage_within(&user(), today, 5).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn capped_increment_falls_back_to_durable() {
        let f = fixture();
        let today = UsageDate::today();
        f.cache.set_unavailable(true);

        assert_eq!(
            f.store.incr_daily_usage_within(&user(), today, 1).await.unwrap(),
            Some(1)
        );
        assert_eq!(
            f.store.incr_daily_usage_within(&user(), today, 1).await.unwrap(),
            None
        );
    }

    // ════════════════════════════════════════════════════════════════════════
    // Boost packs
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn empty_cached_pack_falls_through_and_refills() {
        let f = fixture();
        f.durable.set_boost_pack(valid_pack(10)).await;

        assert_eq!(f.store.get_boost_pack(&user()).await.unwrap().videos_remaining, 10);

        let cache = f.cache.clone();
        assert!(
            eventually(|| {
                let cache = cache.clone();
                async move { cache.get_boost_pack(&user()).await.unwrap().videos_remaining == 10 }
            })
            .await
        );
    }

    #[tokio::test]
    async fn decrement_is_durable_first_and_updates_cache() {
        let f = fixture();
        f.durable.set_boost_pack(valid_pack(3)).await;
        f.cache.set_boost_pack(valid_pack(3)).await;

        let pack = f.store.decr_boost_pack(&user()).await.unwrap();
        assert_eq!(pack.videos_remaining, 2);
        assert_eq!(f.durable.get_boost_pack(&user()).await.unwrap().videos_remaining, 2);
        assert_eq!(f.cache.get_boost_pack(&user()).await.unwrap().videos_remaining, 2);
    }

    #[tokio::test]
    async fn decrement_ignores_stale_cache() {
        let f = fixture();
        // cache claims videos the durable store no longer has
        f.cache.set_boost_pack(valid_pack(5)).await;

        let err = f.store.decr_boost_pack(&user()).await.unwrap_err();
        assert!(matches!(err, MembershipError::InvalidPack(_)));
    }

    #[tokio::test]
    async fn late_cache_write_cannot_resurrect_spent_videos() {
        let durable = InMemoryMembershipStore::new();
        let cache = InMemoryMembershipStore::new();
        let store = HybridMembershipStore::new(
            Arc::new(durable.clone()),
            Arc::new(SlowCache {
                inner: cache.clone(),
                delay: Duration::from_millis(50),
            }),
            HybridSettings::default(),
        );
        store.save_boost_pack(&valid_pack(2)).await.unwrap();

        let user_id = user();
        let (first, second) = tokio::join!(
            store.decr_boost_pack(&user_id),
            store.decr_boost_pack(&user_id)
        );
        let mut balances = [
            first.unwrap().videos_remaining,
            second.unwrap().videos_remaining,
        ];
        balances.sort_unstable();
        assert_eq!(balances, [0, 1]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(durable.get_boost_pack(&user()).await.unwrap().videos_remaining, 0);
        assert_eq!(cache.get_boost_pack(&user()).await.unwrap().videos_remaining, 0);
        assert_eq!(store.get_boost_pack(&user()).await.unwrap().videos_remaining, 0);
        assert!(matches!(
            store.decr_boost_pack(&user()).await,
            Err(MembershipError::InvalidPack(_))
        ));
    }

    #[tokio::test]
    async fn refused_decrement_repairs_overstated_cache() {
        let f = fixture();
        let cached = valid_pack(1);
        f.durable
            .set_boost_pack(BoostPack {
                videos_remaining: 0,
                ..cached.clone()
            })
            .await;
        f.cache.set_boost_pack(cached).await;

        let err = f.store.decr_boost_pack(&user()).await.unwrap_err();
        assert!(matches!(err, MembershipError::InvalidPack(_)));
        assert_eq!(f.cache.get_boost_pack(&user()).await.unwrap().videos_remaining, 0);
        assert_eq!(f.store.get_boost_pack(&user()).await.unwrap().videos_remaining, 0);
    }

    #[tokio::test]
    async fn stale_refill_does_not_overwrite_newer_purchase() {
        let f = fixture();
        let old = valid_pack(3);
        let newer = BoostPack {
            videos_remaining: 13,
            last_purchase_at: old.last_purchase_at.map(|t| t.add_secs(60)),
            ..old.clone()
        };
        f.cache.set_boost_pack(newer).await;

        f.store.merge_boost_pack(&old).await.unwrap();
        assert_eq!(f.cache.get_boost_pack(&user()).await.unwrap().videos_remaining, 13);
        assert_eq!(f.durable.get_boost_pack(&user()).await.unwrap().videos_remaining, 3);
    }
}
