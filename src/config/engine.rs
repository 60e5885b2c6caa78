//! Engine configuration: backend selection, cache TTLs and sync cadence

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Which store the engine runs against
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store, no external services
    Memory,
    /// PostgreSQL only
    Postgres,
    /// PostgreSQL behind a Redis cache
    #[default]
    Hybrid,
}

impl StoreBackend {
    pub fn needs_database(&self) -> bool {
        matches!(self, StoreBackend::Postgres | StoreBackend::Hybrid)
    }

    pub fn needs_redis(&self) -> bool {
        matches!(self, StoreBackend::Hybrid)
    }
}

/// Engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Store backend
    #[serde(default)]
    pub backend: StoreBackend,

    /// Cache TTL for memberships without a future paid expiry
    #[serde(default = "default_membership_cache_ttl")]
    pub membership_cache_ttl_secs: u64,

    /// Cache TTL for daily usage counters, re-set on every increment
    #[serde(default = "default_usage_ttl")]
    pub usage_ttl_secs: u64,

    /// Mirror the cached usage counter to the database every Nth increment
    #[serde(default = "default_usage_sync_every")]
    pub usage_sync_every: u32,

    /// Timeout for background cache repopulation in milliseconds
    #[serde(default = "default_cache_refresh_timeout")]
    pub cache_refresh_timeout_ms: u64,

    /// Timeout for background usage sync in milliseconds
    #[serde(default = "default_usage_sync_timeout")]
    pub usage_sync_timeout_ms: u64,

    /// Allow feature names missing from the catalog
    #[serde(default = "default_allow_unknown_features")]
    pub allow_unknown_features: bool,
}

impl EngineConfig {
    pub fn membership_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.membership_cache_ttl_secs)
    }

    pub fn usage_ttl(&self) -> Duration {
        Duration::from_secs(self.usage_ttl_secs)
    }

    pub fn cache_refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_refresh_timeout_ms)
    }

    pub fn usage_sync_timeout(&self) -> Duration {
        Duration::from_millis(self.usage_sync_timeout_ms)
    }

    /// Validate engine configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.usage_sync_every == 0 {
            return Err(ValidationError::InvalidSyncInterval);
        }
        if self.membership_cache_ttl_secs == 0 {
            return Err(ValidationError::InvalidTimeout("engine.membership_cache_ttl_secs"));
        }
        // a usage key must outlive the day it counts
        if self.usage_ttl_secs < 86_400 {
            return Err(ValidationError::InvalidTimeout("engine.usage_ttl_secs"));
        }
        if self.cache_refresh_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout("engine.cache_refresh_timeout_ms"));
        }
        if self.usage_sync_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout("engine.usage_sync_timeout_ms"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            membership_cache_ttl_secs: default_membership_cache_ttl(),
            usage_ttl_secs: default_usage_ttl(),
            usage_sync_every: default_usage_sync_every(),
            cache_refresh_timeout_ms: default_cache_refresh_timeout(),
            usage_sync_timeout_ms: default_usage_sync_timeout(),
            allow_unknown_features: default_allow_unknown_features(),
        }
    }
}

fn default_membership_cache_ttl() -> u64 {
    300
}

fn default_usage_ttl() -> u64 {
    25 * 3600
}

fn default_usage_sync_every() -> u32 {
    10
}

fn default_cache_refresh_timeout() -> u64 {
    2_000
}

fn default_usage_sync_timeout() -> u64 {
    5_000
}

fn default_allow_unknown_features() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.backend, StoreBackend::Hybrid);
        assert_eq!(config.membership_cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.usage_ttl(), Duration::from_secs(90_000));
        assert_eq!(config.usage_sync_every, 10);
        assert_eq!(config.cache_refresh_timeout(), Duration::from_secs(2));
        assert_eq!(config.usage_sync_timeout(), Duration::from_secs(5));
        assert!(config.allow_unknown_features);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_requirements() {
        assert!(!StoreBackend::Memory.needs_database());
        assert!(!StoreBackend::Memory.needs_redis());
        assert!(StoreBackend::Postgres.needs_database());
        assert!(!StoreBackend::Postgres.needs_redis());
        assert!(StoreBackend::Hybrid.needs_database());
        assert!(StoreBackend::Hybrid.needs_redis());
    }

    #[test]
    fn test_validation_zero_sync_interval() {
        let config = EngineConfig {
            usage_sync_every: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidSyncInterval)
        ));
    }

    #[test]
    fn test_validation_usage_ttl_shorter_than_a_day() {
        let config = EngineConfig {
            usage_ttl_secs: 3600,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
