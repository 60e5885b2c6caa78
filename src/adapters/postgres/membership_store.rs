//! PostgreSQL implementation of MembershipStore.
//!
//! Entitlement state is stored as columns on the `users` row. Counters and
//! boost balances are mutated with single conditional `UPDATE ... RETURNING`
//! statements; the row lock taken by the update serializes concurrent
//! callers, so no read-then-write happens in Rust.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;

use crate::domain::foundation::{Timestamp, UsageDate, UserId};
use crate::domain::membership::{BoostPack, MembershipError, MembershipTier, UserMembership};
use crate::ports::MembershipStore;

/// Charge one video to `$2`. A row holding a later day is left untouched.
const INCR_USAGE_SQL: &str = r#"
    UPDATE users SET
        daily_usage_count = CASE
            WHEN daily_usage_date = $2 THEN daily_usage_count + 1
            ELSE 1
        END,
        daily_usage_date = $2,
        updated_at = NOW()
    WHERE id = $1
      AND (daily_usage_date IS NULL OR daily_usage_date <= $2)
    RETURNING daily_usage_count
"#;

/// As `INCR_USAGE_SQL`, but only while the count for `$2` is below `$3`.
const INCR_USAGE_WITHIN_SQL: &str = r#"
    UPDATE users SET
        daily_usage_count = CASE
            WHEN daily_usage_date = $2 THEN daily_usage_count + 1
            ELSE 1
        END,
        daily_usage_date = $2,
        updated_at = NOW()
    WHERE id = $1
      AND $3 > 0
      AND (daily_usage_date IS NULL OR daily_usage_date <= $2)
      AND (daily_usage_date IS DISTINCT FROM $2 OR daily_usage_count < $3)
    RETURNING daily_usage_count
"#;

/// PostgreSQL implementation of the MembershipStore port.
#[derive(Clone)]
pub struct PostgresMembershipStore {
    pool: PgPool,
    op_timeout: Duration,
}

impl PostgresMembershipStore {
    /// Creates a store over `pool`; each operation is bounded by `op_timeout`.
    pub fn new(pool: PgPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }

    async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<T, MembershipError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(MembershipError::store_unavailable(format!("{}: {}", op, e))),
            Err(_) => Err(MembershipError::store_unavailable(format!(
                "{}: timed out after {:?}",
                op, self.op_timeout
            ))),
        }
    }

    async fn user_exists(&self, user_id: &UserId) -> Result<bool, MembershipError> {
        self.timed(
            "user_exists",
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(user_id.as_str())
                .fetch_one(&self.pool),
        )
        .await
    }
}

/// Membership columns of a user row.
#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    membership_tier: String,
    membership_expires_at: Option<DateTime<Utc>>,
    subscription_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MembershipRow {
    fn into_membership(self, user_id: UserId) -> UserMembership {
        UserMembership {
            user_id,
            tier: MembershipTier::parse_or_free(&self.membership_tier),
            expires_at: self.membership_expires_at.map(Timestamp::from_datetime),
            subscription_id: self.subscription_id,
            created_at: Timestamp::from_datetime(self.created_at),
            updated_at: Timestamp::from_datetime(self.updated_at),
        }
    }
}

/// Daily usage columns of a user row.
#[derive(Debug, sqlx::FromRow)]
struct UsageRow {
    daily_usage_count: i64,
    daily_usage_date: Option<NaiveDate>,
}

impl UsageRow {
    /// The stored count only applies to the day it was written for.
    fn count_for(&self, date: UsageDate) -> i64 {
        match self.daily_usage_date {
            Some(stored) if stored == date.as_naive() => self.daily_usage_count.max(0),
            _ => 0,
        }
    }
}

/// Boost pack columns of a user row.
#[derive(Debug, sqlx::FromRow)]
struct BoostPackRow {
    boost_pack_videos: i64,
    boost_pack_expires_at: Option<DateTime<Utc>>,
    boost_pack_last_purchase_at: Option<DateTime<Utc>>,
}

impl BoostPackRow {
    fn into_boost_pack(self, user_id: UserId) -> BoostPack {
        BoostPack {
            user_id,
            videos_remaining: self.boost_pack_videos,
            expires_at: self.boost_pack_expires_at.map(Timestamp::from_datetime),
            last_purchase_at: self.boost_pack_last_purchase_at.map(Timestamp::from_datetime),
        }
    }
}

#[async_trait]
impl MembershipStore for PostgresMembershipStore {
    async fn get_membership(&self, user_id: &UserId) -> Result<UserMembership, MembershipError> {
        let row = self
            .timed(
                "get_membership",
                sqlx::query_as::<_, MembershipRow>(
                    r#"
                    SELECT membership_tier, membership_expires_at, subscription_id,
                           created_at, updated_at
                    FROM users
                    WHERE id = $1
                    "#,
                )
                .bind(user_id.as_str())
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(match row {
            Some(row) => row.into_membership(user_id.clone()),
            None => UserMembership::free(user_id.clone()),
        })
    }

    async fn save_membership(&self, membership: &UserMembership) -> Result<(), MembershipError> {
        let result = self
            .timed(
                "save_membership",
                sqlx::query(
                    r#"
                    UPDATE users SET
                        membership_tier = $2,
                        membership_expires_at = $3,
                        subscription_id = $4,
                        updated_at = $5
                    WHERE id = $1
                    "#,
                )
                .bind(membership.user_id.as_str())
                .bind(membership.tier.as_str())
                .bind(membership.expires_at.map(|t| *t.as_datetime()))
                .bind(&membership.subscription_id)
                .bind(membership.updated_at.as_datetime())
                .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(MembershipError::not_found(membership.user_id.clone()));
        }
        Ok(())
    }

    async fn get_daily_usage(
        &self,
        user_id: &UserId,
        date: UsageDate,
    ) -> Result<i64, MembershipError> {
        let row = self
            .timed(
                "get_daily_usage",
                sqlx::query_as::<_, UsageRow>(
                    "SELECT daily_usage_count, daily_usage_date FROM users WHERE id = $1",
                )
                .bind(user_id.as_str())
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(|r| r.count_for(date)).unwrap_or(0))
    }

    async fn incr_daily_usage(
        &self,
        user_id: &UserId,
        date: UsageDate,
    ) -> Result<i64, MembershipError> {
        let count = self
            .timed(
                "incr_daily_usage",
                sqlx::query_scalar::<_, i64>(INCR_USAGE_SQL)
                    .bind(user_id.as_str())
                    .bind(date.as_naive())
                    .fetch_optional(&self.pool),
            )
            .await?;

        if let Some(count) = count {
            return Ok(count);
        }

        // no row, or the row already counts a later day
        let current = self
            .timed(
                "incr_daily_usage",
                sqlx::query_scalar::<_, i64>("SELECT daily_usage_count FROM users WHERE id = $1")
                    .bind(user_id.as_str())
                    .fetch_optional(&self.pool),
            )
            .await?;
        current.ok_or_else(|| MembershipError::not_found(user_id.clone()))
    }

    async fn incr_daily_usage_within(
        &self,
        user_id: &UserId,
        date: UsageDate,
        limit: u32,
    ) -> Result<Option<i64>, MembershipError> {
        let count = self
            .timed(
                "incr_daily_usage_within",
                sqlx::query_scalar::<_, i64>(INCR_USAGE_WITHIN_SQL)
                    .bind(user_id.as_str())
                    .bind(date.as_naive())
                    .bind(i64::from(limit))
                    .fetch_optional(&self.pool),
            )
            .await?;

        match count {
            Some(count) => Ok(Some(count)),
            None if self.user_exists(user_id).await? => Ok(None),
            None => Err(MembershipError::not_found(user_id.clone())),
        }
    }

    async fn sync_daily_usage(
        &self,
        user_id: &UserId,
        date: UsageDate,
        count: i64,
    ) -> Result<(), MembershipError> {
        self.timed(
            "sync_daily_usage",
            sqlx::query(
                r#"
                UPDATE users SET
                    daily_usage_count = CASE
                        WHEN daily_usage_date = $2 THEN GREATEST(daily_usage_count, $3)
                        ELSE $3
                    END,
                    daily_usage_date = $2
                WHERE id = $1
                  AND (daily_usage_date IS NULL OR daily_usage_date <= $2)
                "#,
            )
            .bind(user_id.as_str())
            .bind(date.as_naive())
            .bind(count)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn get_boost_pack(&self, user_id: &UserId) -> Result<BoostPack, MembershipError> {
        let row = self
            .timed(
                "get_boost_pack",
                sqlx::query_as::<_, BoostPackRow>(
                    r#"
                    SELECT boost_pack_videos, boost_pack_expires_at, boost_pack_last_purchase_at
                    FROM users
                    WHERE id = $1
                    "#,
                )
                .bind(user_id.as_str())
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(match row {
            Some(row) => row.into_boost_pack(user_id.clone()),
            None => BoostPack::empty(user_id.clone()),
        })
    }

    async fn save_boost_pack(&self, pack: &BoostPack) -> Result<(), MembershipError> {
        let result = self
            .timed(
                "save_boost_pack",
                sqlx::query(
                    r#"
                    UPDATE users SET
                        boost_pack_videos = $2,
                        boost_pack_expires_at = $3,
                        boost_pack_last_purchase_at = $4,
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(pack.user_id.as_str())
                .bind(pack.videos_remaining)
                .bind(pack.expires_at.map(|t| *t.as_datetime()))
                .bind(pack.last_purchase_at.map(|t| *t.as_datetime()))
                .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(MembershipError::not_found(pack.user_id.clone()));
        }
        Ok(())
    }

    async fn merge_boost_pack(&self, pack: &BoostPack) -> Result<(), MembershipError> {
        let result = self
            .timed(
                "merge_boost_pack",
                sqlx::query(
                    r#"
                    UPDATE users SET
                        boost_pack_videos = $2,
                        boost_pack_expires_at = $3,
                        boost_pack_last_purchase_at = $4,
                        updated_at = NOW()
                    WHERE id = $1
                      AND (
                        ($4::timestamptz IS NOT NULL
                            AND (boost_pack_last_purchase_at IS NULL
                                OR boost_pack_last_purchase_at < $4))
                        OR (boost_pack_last_purchase_at IS NOT DISTINCT FROM $4
                            AND boost_pack_videos > $2)
                      )
                    "#,
                )
                .bind(pack.user_id.as_str())
                .bind(pack.videos_remaining)
                .bind(pack.expires_at.map(|t| *t.as_datetime()))
                .bind(pack.last_purchase_at.map(|t| *t.as_datetime()))
                .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 && !self.user_exists(&pack.user_id).await? {
            return Err(MembershipError::not_found(pack.user_id.clone()));
        }
        Ok(())
    }

    async fn decr_boost_pack(&self, user_id: &UserId) -> Result<BoostPack, MembershipError> {
        let row = self
            .timed(
                "decr_boost_pack",
                sqlx::query_as::<_, BoostPackRow>(
                    r#"
                    UPDATE users SET
                        boost_pack_videos = boost_pack_videos - 1,
                        updated_at = NOW()
                    WHERE id = $1
                      AND boost_pack_videos > 0
                      AND boost_pack_expires_at > $2
                    RETURNING boost_pack_videos, boost_pack_expires_at, boost_pack_last_purchase_at
                    "#,
                )
                .bind(user_id.as_str())
                .bind(*Timestamp::now().as_datetime())
                .fetch_optional(&self.pool),
            )
            .await?;

        row.map(|r| r.into_boost_pack(user_id.clone()))
            .ok_or_else(|| MembershipError::invalid_pack(user_id.clone()))
    }
}

impl std::fmt::Debug for PostgresMembershipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresMembershipStore")
            .field("op_timeout", &self.op_timeout)
            .finish_non_exhaustive()
    }
}
