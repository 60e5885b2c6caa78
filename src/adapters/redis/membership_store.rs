//! Redis-backed cache implementation of MembershipStore.
//!
//! A TTL-bounded mirror of the durable store. Key layout:
//!
//! | Record | Key | Type |
//! |--------|-----|------|
//! | Membership | `{prefix}membership:{user}` | JSON string |
//! | Daily usage | `{prefix}usage:{user}:{YYYY-MM-DD}` | integer |
//! | Boost pack | `{prefix}boost:{user}` | hash |
//!
//! Conditional mutations run as Lua scripts so each is one atomic server
//! step; the counter's expiry is re-set on every increment.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::config::RedisConfig;
use crate::domain::foundation::{Timestamp, UsageDate, UserId};
use crate::domain::membership::{BoostPack, MembershipError, UserMembership};
use crate::ports::MembershipStore;

const ONE_HOUR: Duration = Duration::from_secs(3600);

const FIELD_VIDEOS: &str = "videos_remaining";
const FIELD_EXPIRES: &str = "expires_at";
const FIELD_LAST_PURCHASE: &str = "last_purchase_at";

/// INCR only while below ARGV[1]; returns -1 when at or over the limit.
static INCR_WITHIN_SCRIPT: Lazy<redis::Script> = Lazy::new(|| {
    redis::Script::new(
        r#"
        local current = tonumber(redis.call('GET', KEYS[1]) or '0')
        if current >= tonumber(ARGV[1]) then
            return -1
        end
        local n = redis.call('INCR', KEYS[1])
        redis.call('EXPIRE', KEYS[1], ARGV[2])
        return n
        "#,
    )
});

/// Raise the counter to ARGV[1] if it is lower.
static SYNC_SCRIPT: Lazy<redis::Script> = Lazy::new(|| {
    redis::Script::new(
        r#"
        local current = tonumber(redis.call('GET', KEYS[1]) or '0')
        if tonumber(ARGV[1]) > current then
            redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[2])
        end
        return 0
        "#,
    )
});

/// Take one video if the pack is valid at ARGV[1] (unix secs).
///
/// Returns `{remaining, expires_at, last_purchase_at}` or an empty array.
/// Missing and blank fields read as 0, so a pack without an expiry is invalid.
const DECR_LUA: &str = r#"
    local remaining = tonumber(redis.call('HGET', KEYS[1], 'videos_remaining') or '') or 0
    local expires = tonumber(redis.call('HGET', KEYS[1], 'expires_at') or '') or 0
    if remaining <= 0 or expires <= tonumber(ARGV[1]) then
        return {}
    end
    local n = redis.call('HINCRBY', KEYS[1], 'videos_remaining', -1)
    local last = redis.call('HGET', KEYS[1], 'last_purchase_at') or ''
    return {tostring(n), tostring(expires), last}
"#;

static DECR_SCRIPT: Lazy<redis::Script> = Lazy::new(|| redis::Script::new(DECR_LUA));

/// Replace the pack unless the stored one is newer.
///
/// ARGV: videos, expires_at, last_purchase_at (unix secs or blank), TTL.
/// A blank purchase time sorts before any real one. Returns 1 if written.
const MERGE_LUA: &str = r#"
    if redis.call('EXISTS', KEYS[1]) == 1 then
        local stored_last = tonumber(redis.call('HGET', KEYS[1], 'last_purchase_at') or '') or -1
        local last = tonumber(ARGV[3]) or -1
        if last < stored_last then
            return 0
        end
        if last == stored_last then
            local stored = tonumber(redis.call('HGET', KEYS[1], 'videos_remaining') or '') or 0
            if tonumber(ARGV[1]) >= stored then
                return 0
            end
        end
    end
    redis.call('DEL', KEYS[1])
    redis.call('HSET', KEYS[1], 'videos_remaining', ARGV[1], 'expires_at', ARGV[2], 'last_purchase_at', ARGV[3])
    redis.call('EXPIRE', KEYS[1], ARGV[4])
    return 1
"#;

static MERGE_SCRIPT: Lazy<redis::Script> = Lazy::new(|| redis::Script::new(MERGE_LUA));

/// TTLs and limits for the cache store.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub key_prefix: String,
    /// TTL for memberships without a future paid expiry.
    pub membership_ttl: Duration,
    /// TTL for daily usage counters.
    pub usage_ttl: Duration,
    /// Upper bound on a single command.
    pub op_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            key_prefix: "entitlement:".to_string(),
            membership_ttl: Duration::from_secs(300),
            usage_ttl: Duration::from_secs(25 * 3600),
            op_timeout: Duration::from_secs(2),
        }
    }
}

/// Open a multiplexed connection to the configured Redis.
pub async fn connect(config: &RedisConfig) -> Result<MultiplexedConnection, redis::RedisError> {
    let client = redis::Client::open(config.url.as_str())?;
    client.get_multiplexed_tokio_connection().await
}

/// Redis cache store.
#[derive(Clone)]
pub struct RedisMembershipStore {
    conn: MultiplexedConnection,
    settings: CacheSettings,
}

impl RedisMembershipStore {
    pub fn new(conn: MultiplexedConnection, settings: CacheSettings) -> Self {
        Self { conn, settings }
    }

    fn membership_key(&self, user_id: &UserId) -> String {
        format!("{}membership:{}", self.settings.key_prefix, user_id)
    }

    fn usage_key(&self, user_id: &UserId, date: UsageDate) -> String {
        format!("{}usage:{}:{}", self.settings.key_prefix, user_id, date)
    }

    fn boost_key(&self, user_id: &UserId) -> String {
        format!("{}boost:{}", self.settings.key_prefix, user_id)
    }

    async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<T, MembershipError>
    where
        F: Future<Output = Result<T, redis::RedisError>>,
    {
        match tokio::time::timeout(self.settings.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(MembershipError::store_unavailable(format!("{}: {}", op, e))),
            Err(_) => Err(MembershipError::store_unavailable(format!(
                "{}: timed out after {:?}",
                op, self.settings.op_timeout
            ))),
        }
    }
}

/// Cache lifetime for a membership record.
///
/// A paid membership with a future expiry is kept until an hour past it (and
/// at least `default`); everything else gets `default`.
pub(crate) fn membership_ttl(
    membership: &UserMembership,
    now: &Timestamp,
    default: Duration,
) -> Duration {
    match membership.expires_at {
        Some(end) if membership.tier.is_paid() && end.is_after(now) => {
            let until = end.duration_since(now).to_std().unwrap_or_default();
            (until + ONE_HOUR).max(default)
        }
        _ => default,
    }
}

/// Cache lifetime for a boost pack: an hour past expiry, at least an hour.
pub(crate) fn boost_ttl(pack: &BoostPack, now: &Timestamp) -> Duration {
    let until = pack
        .expires_at
        .filter(|end| end.is_after(now))
        .and_then(|end| end.duration_since(now).to_std().ok())
        .unwrap_or_default();
    (until + ONE_HOUR).max(ONE_HOUR)
}

fn parse_unix(value: Option<&String>) -> Option<Timestamp> {
    value
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(Timestamp::from_unix_secs)
}

/// Rebuilds a pack from its hash fields. An empty hash is an empty pack.
pub(crate) fn pack_from_fields(user_id: &UserId, fields: &HashMap<String, String>) -> BoostPack {
    BoostPack {
        user_id: user_id.clone(),
        videos_remaining: fields
            .get(FIELD_VIDEOS)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        expires_at: parse_unix(fields.get(FIELD_EXPIRES)),
        last_purchase_at: parse_unix(fields.get(FIELD_LAST_PURCHASE)),
    }
}

fn unix_field(ts: Option<Timestamp>) -> String {
    ts.map(|t| t.as_unix_secs().to_string()).unwrap_or_default()
}

#[async_trait]
impl MembershipStore for RedisMembershipStore {
    async fn get_membership(&self, user_id: &UserId) -> Result<UserMembership, MembershipError> {
        let key = self.membership_key(user_id);
        let mut conn = self.conn.clone();

        let raw: Option<String> = self.timed("get_membership", conn.get(&key)).await?;

        match raw {
            None => Ok(UserMembership::free(user_id.clone())),
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                MembershipError::store_unavailable(format!("corrupt cached membership: {}", e))
            }),
        }
    }

    async fn save_membership(&self, membership: &UserMembership) -> Result<(), MembershipError> {
        let key = self.membership_key(&membership.user_id);
        let json = serde_json::to_string(membership).map_err(|e| {
            MembershipError::store_unavailable(format!("serialize membership: {}", e))
        })?;
        let ttl = membership_ttl(membership, &Timestamp::now(), self.settings.membership_ttl);
        let mut conn = self.conn.clone();

        self.timed(
            "save_membership",
            redis::cmd("SET")
                .arg(&key)
                .arg(json)
                .arg("EX")
                .arg(ttl.as_secs().max(1))
                .query_async::<_, ()>(&mut conn),
        )
        .await
    }

    async fn get_daily_usage(
        &self,
        user_id: &UserId,
        date: UsageDate,
    ) -> Result<i64, MembershipError> {
        let key = self.usage_key(user_id, date);
        let mut conn = self.conn.clone();

        let count: Option<i64> = self.timed("get_daily_usage", conn.get(&key)).await?;
        Ok(count.unwrap_or(0))
    }

    async fn incr_daily_usage(
        &self,
        user_id: &UserId,
        date: UsageDate,
    ) -> Result<i64, MembershipError> {
        let key = self.usage_key(user_id, date);
        let mut conn = self.conn.clone();

        let (count,): (i64,) = self
            .timed(
                "incr_daily_usage",
                redis::pipe()
                    .atomic()
                    .cmd("INCR")
                    .arg(&key)
                    .cmd("EXPIRE")
                    .arg(&key)
                    .arg(self.settings.usage_ttl.as_secs())
                    .ignore()
                    .query_async(&mut conn),
            )
            .await?;
        Ok(count)
    }

    async fn incr_daily_usage_within(
        &self,
        user_id: &UserId,
        date: UsageDate,
        limit: u32,
    ) -> Result<Option<i64>, MembershipError> {
        let key = self.usage_key(user_id, date);
        let mut conn = self.conn.clone();

        let count: i64 = self
            .timed(
                "incr_daily_usage_within",
                INCR_WITHIN_SCRIPT
                    .key(&key)
                    .arg(limit)
                    .arg(self.settings.usage_ttl.as_secs())
                    .invoke_async(&mut conn),
            )
            .await?;
        Ok((count >= 0).then_some(count))
    }

    async fn sync_daily_usage(
        &self,
        user_id: &UserId,
        date: UsageDate,
        count: i64,
    ) -> Result<(), MembershipError> {
        let key = self.usage_key(user_id, date);
        let mut conn = self.conn.clone();

        let _: i64 = self
            .timed(
                "sync_daily_usage",
                SYNC_SCRIPT
                    .key(&key)
                    .arg(count)
                    .arg(self.settings.usage_ttl.as_secs())
                    .invoke_async(&mut conn),
            )
            .await?;
        Ok(())
    }

    async fn get_boost_pack(&self, user_id: &UserId) -> Result<BoostPack, MembershipError> {
        let key = self.boost_key(user_id);
        let mut conn = self.conn.clone();

        let fields: HashMap<String, String> =
            self.timed("get_boost_pack", conn.hgetall(&key)).await?;
        Ok(pack_from_fields(user_id, &fields))
    }

    async fn save_boost_pack(&self, pack: &BoostPack) -> Result<(), MembershipError> {
        let key = self.boost_key(&pack.user_id);
        let ttl = boost_ttl(pack, &Timestamp::now());
        let mut conn = self.conn.clone();

        self.timed(
            "save_boost_pack",
            redis::pipe()
                .atomic()
                .cmd("DEL")
                .arg(&key)
                .ignore()
                .cmd("HSET")
                .arg(&key)
                .arg(FIELD_VIDEOS)
                .arg(pack.videos_remaining)
                .arg(FIELD_EXPIRES)
                .arg(unix_field(pack.expires_at))
                .arg(FIELD_LAST_PURCHASE)
                .arg(unix_field(pack.last_purchase_at))
                .ignore()
                .cmd("EXPIRE")
                .arg(&key)
                .arg(ttl.as_secs())
                .ignore()
                .query_async::<_, ()>(&mut conn),
        )
        .await
    }

    async fn merge_boost_pack(&self, pack: &BoostPack) -> Result<(), MembershipError> {
        let key = self.boost_key(&pack.user_id);
        let ttl = boost_ttl(pack, &Timestamp::now());
        let mut conn = self.conn.clone();

        let _: i64 = self
            .timed(
                "merge_boost_pack",
                MERGE_SCRIPT
                    .key(&key)
                    .arg(pack.videos_remaining)
                    .arg(unix_field(pack.expires_at))
                    .arg(unix_field(pack.last_purchase_at))
                    .arg(ttl.as_secs())
                    .invoke_async(&mut conn),
            )
            .await?;
        Ok(())
    }

    async fn decr_boost_pack(&self, user_id: &UserId) -> Result<BoostPack, MembershipError> {
        let key = self.boost_key(user_id);
        let mut conn = self.conn.clone();

        let reply: Vec<String> = self
            .timed(
                "decr_boost_pack",
                DECR_SCRIPT
                    .key(&key)
                    .arg(Timestamp::now().as_unix_secs())
                    .invoke_async(&mut conn),
            )
            .await?;

        match reply.as_slice() {
            [remaining, expires, last] => {
                let fields = HashMap::from([
                    (FIELD_VIDEOS.to_string(), remaining.clone()),
                    (FIELD_EXPIRES.to_string(), expires.clone()),
                    (FIELD_LAST_PURCHASE.to_string(), last.clone()),
                ]);
                Ok(pack_from_fields(user_id, &fields))
            }
            _ => Err(MembershipError::invalid_pack(user_id.clone())),
        }
    }
}

impl std::fmt::Debug for RedisMembershipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisMembershipStore")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
