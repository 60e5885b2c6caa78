//! Membership store port.
//!
//! One storage contract for memberships, daily usage counters and boost
//! packs. The in-memory, PostgreSQL, Redis and hybrid adapters all implement
//! it, so services never know which backend they run against.
//!
//! # Design
//!
//! - **Absence is not an error**: reads synthesize a free membership, a
//!   zero counter or an empty pack
//! - **Atomic mutations**: every increment and decrement is a single
//!   backend-native conditional operation, never read-then-write
//! - **Bounded I/O**: each call is wrapped in the backend's timeout and
//!   expiry surfaces as `StoreUnavailable`
//!
//! # Example
//!
//! ```ignore
//! async fn charge_daily(
//!     store: &dyn MembershipStore,
//!     user_id: &UserId,
//!     limit: u32,
//! ) -> Result<bool, MembershipError> {
//!     let today = UsageDate::today();
//!     Ok(store.incr_daily_usage_within(user_id, today, limit).await?.is_some())
//! }
//! ```

use async_trait::async_trait;

use crate::domain::foundation::{UsageDate, UserId};
use crate::domain::membership::{BoostPack, MembershipError, UserMembership};

/// Storage port for entitlement state.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Load a user's membership.
    ///
    /// Never fails with `NotFound`; absent users yield `UserMembership::free`.
    async fn get_membership(&self, user_id: &UserId) -> Result<UserMembership, MembershipError>;

    /// Upsert a membership by user id.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the backend requires an existing user row
    /// - `StoreUnavailable` on I/O failure or timeout
    async fn save_membership(&self, membership: &UserMembership) -> Result<(), MembershipError>;

    /// Videos processed on `date`. Absent counters read as 0.
    async fn get_daily_usage(&self, user_id: &UserId, date: UsageDate)
        -> Result<i64, MembershipError>;

    /// Atomically increment the counter for `date` and return the new value.
    ///
    /// A counter stored for an earlier day is reset before incrementing.
    async fn incr_daily_usage(&self, user_id: &UserId, date: UsageDate)
        -> Result<i64, MembershipError>;

    /// Atomically increment only while the counter for `date` is below
    /// `limit`.
    ///
    /// Returns the new value, or `None` when the counter is already at or
    /// over the limit (nothing is written in that case).
    async fn incr_daily_usage_within(
        &self,
        user_id: &UserId,
        date: UsageDate,
        limit: u32,
    ) -> Result<Option<i64>, MembershipError>;

    /// Raise the counter for `date` to at least `count`.
    ///
    /// Never lowers a counter and never overwrites a later day.
    async fn sync_daily_usage(
        &self,
        user_id: &UserId,
        date: UsageDate,
        count: i64,
    ) -> Result<(), MembershipError>;

    /// Load a user's boost pack. Absent packs yield `BoostPack::empty`.
    async fn get_boost_pack(&self, user_id: &UserId) -> Result<BoostPack, MembershipError>;

    /// Upsert a boost pack by user id.
    async fn save_boost_pack(&self, pack: &BoostPack) -> Result<(), MembershipError>;

    /// Write `pack` unless the stored pack is already newer.
    ///
    /// Lands when no pack is stored or when `pack` supersedes the stored one
    /// (see `BoostPack::supersedes`). Losing the comparison is not an error.
    async fn merge_boost_pack(&self, pack: &BoostPack) -> Result<(), MembershipError>;

    /// Atomically take one video from a currently valid pack.
    ///
    /// Returns the pack as it stands after the decrement.
    ///
    /// # Errors
    ///
    /// - `InvalidPack` if the pack is empty, expired or missing
    /// - `StoreUnavailable` on I/O failure or timeout
    async fn decr_boost_pack(&self, user_id: &UserId) -> Result<BoostPack, MembershipError>;
}
