//! In-memory membership store for testing, development and single-node use.
//!
//! All state lives behind one `RwLock`; every mutation takes the write lock,
//! so increments and decrements are linearizable per process.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{Timestamp, UsageDate, UserId};
use crate::domain::membership::{BoostPack, MembershipError, MembershipTier, UserMembership};
use crate::ports::MembershipStore;

#[derive(Debug, Default)]
struct State {
    /// Known user rows; only consulted when `require_users` is set.
    users: HashSet<UserId>,
    memberships: HashMap<UserId, UserMembership>,
    usage: HashMap<UserId, DailyCounter>,
    boost_packs: HashMap<UserId, BoostPack>,
}

/// A user's counter for the latest day charged. Earlier days are dropped.
#[derive(Debug, Clone, Copy)]
struct DailyCounter {
    date: UsageDate,
    count: i64,
}

impl DailyCounter {
    fn count_for(&self, date: UsageDate) -> i64 {
        if self.date == date {
            self.count
        } else {
            0
        }
    }
}

/// The user's counter positioned at `date`, reset if it holds an earlier day.
///
/// Fails with the stored count when the counter already holds a later day;
/// that counter is left as is.
fn counter_at<'a>(
    usage: &'a mut HashMap<UserId, DailyCounter>,
    user_id: &UserId,
    date: UsageDate,
) -> Result<&'a mut DailyCounter, i64> {
    let counter = usage
        .entry(user_id.clone())
        .or_insert(DailyCounter { date, count: 0 });
    if counter.date > date {
        return Err(counter.count);
    }
    if counter.date < date {
        *counter = DailyCounter { date, count: 0 };
    }
    Ok(counter)
}

/// In-memory implementation of `MembershipStore`.
///
/// Cheap to clone; clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMembershipStore {
    state: Arc<RwLock<State>>,
    /// When set, every operation fails with `StoreUnavailable`.
    unavailable: Arc<AtomicBool>,
    /// When set, saving a membership requires a registered user row.
    require_users: bool,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects membership writes for unregistered users,
    /// the way the durable backend does.
    pub fn requiring_users() -> Self {
        Self {
            require_users: true,
            ..Self::default()
        }
    }

    /// Register a user row.
    pub async fn register_user(&self, user_id: &UserId) {
        self.state.write().await.users.insert(user_id.clone());
    }

    /// Simulate a backend outage (or recovery).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    // ─── Test fixtures ───────────────────────────────────────────────

    /// Set a user's tier with no expiry.
    pub async fn set_tier(&self, user_id: &UserId, tier: MembershipTier) {
        self.set_tier_with_expiry(user_id, tier, None).await;
    }

    /// Set a user's tier with an explicit expiry.
    pub async fn set_tier_with_expiry(
        &self,
        user_id: &UserId,
        tier: MembershipTier,
        expires_at: Option<Timestamp>,
    ) {
        let membership = UserMembership::with_tier(user_id.clone(), tier, expires_at);
        let mut state = self.state.write().await;
        state.users.insert(user_id.clone());
        state.memberships.insert(user_id.clone(), membership);
    }

    /// Overwrite the user's usage counter with `count` for `date`.
    pub async fn set_daily_usage(&self, user_id: &UserId, date: UsageDate, count: i64) {
        self.state
            .write()
            .await
            .usage
            .insert(user_id.clone(), DailyCounter { date, count });
    }

    /// Overwrite a user's boost pack.
    pub async fn set_boost_pack(&self, pack: BoostPack) {
        self.state
            .write()
            .await
            .boost_packs
            .insert(pack.user_id.clone(), pack);
    }

    /// Whether a membership record is stored for the user.
    pub async fn has_membership(&self, user_id: &UserId) -> bool {
        self.state.read().await.memberships.contains_key(user_id)
    }

    /// Whether a boost pack record is stored for the user.
    pub async fn has_boost_pack(&self, user_id: &UserId) -> bool {
        self.state.read().await.boost_packs.contains_key(user_id)
    }

    /// Drop all state.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        *state = State::default();
    }

    fn check_available(&self) -> Result<(), MembershipError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MembershipError::store_unavailable(
                "in-memory store marked unavailable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn get_membership(&self, user_id: &UserId) -> Result<UserMembership, MembershipError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .memberships
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserMembership::free(user_id.clone())))
    }

    async fn save_membership(&self, membership: &UserMembership) -> Result<(), MembershipError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if self.require_users && !state.users.contains(&membership.user_id) {
            return Err(MembershipError::not_found(membership.user_id.clone()));
        }
        state
            .memberships
            .insert(membership.user_id.clone(), membership.clone());
        Ok(())
    }

    async fn get_daily_usage(
        &self,
        user_id: &UserId,
        date: UsageDate,
    ) -> Result<i64, MembershipError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .usage
            .get(user_id)
            .map(|counter| counter.count_for(date))
            .unwrap_or(0))
    }

    async fn incr_daily_usage(
        &self,
        user_id: &UserId,
        date: UsageDate,
    ) -> Result<i64, MembershipError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        match counter_at(&mut state.usage, user_id, date) {
            Ok(counter) => {
                counter.count += 1;
                Ok(counter.count)
            }
            // a later day is already being counted; leave it alone
            Err(current) => Ok(current),
        }
    }

    async fn incr_daily_usage_within(
        &self,
        user_id: &UserId,
        date: UsageDate,
        limit: u32,
    ) -> Result<Option<i64>, MembershipError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        match counter_at(&mut state.usage, user_id, date) {
            Ok(counter) if counter.count < i64::from(limit) => {
                counter.count += 1;
                Ok(Some(counter.count))
            }
            _ => Ok(None),
        }
    }

    async fn sync_daily_usage(
        &self,
        user_id: &UserId,
        date: UsageDate,
        count: i64,
    ) -> Result<(), MembershipError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if let Ok(counter) = counter_at(&mut state.usage, user_id, date) {
            counter.count = counter.count.max(count);
        }
        Ok(())
    }

    async fn get_boost_pack(&self, user_id: &UserId) -> Result<BoostPack, MembershipError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .boost_packs
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| BoostPack::empty(user_id.clone())))
    }

    async fn save_boost_pack(&self, pack: &BoostPack) -> Result<(), MembershipError> {
        self.check_available()?;
        self.state
            .write()
            .await
            .boost_packs
            .insert(pack.user_id.clone(), pack.clone());
        Ok(())
    }

    async fn merge_boost_pack(&self, pack: &BoostPack) -> Result<(), MembershipError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        match state.boost_packs.get(&pack.user_id) {
            Some(stored) if !pack.supersedes(stored) => {}
            _ => {
                state.boost_packs.insert(pack.user_id.clone(), pack.clone());
            }
        }
        Ok(())
    }

    async fn decr_boost_pack(&self, user_id: &UserId) -> Result<BoostPack, MembershipError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        match state.boost_packs.get_mut(user_id) {
            Some(pack) if pack.is_valid() => {
                pack.videos_remaining -= 1;
                Ok(pack.clone())
            }
            _ => Err(MembershipError::invalid_pack(user_id.clone())),
        }
    }
}
