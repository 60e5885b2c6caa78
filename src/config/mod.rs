//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `ENTITLEMENT` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use entitlement_engine::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Running against the {:?} backend", config.engine.backend);
//! ```

mod database;
mod engine;
mod error;
mod logging;
mod redis;

pub use database::DatabaseConfig;
pub use engine::{EngineConfig, StoreBackend};
pub use error::{ConfigError, ValidationError};
pub use logging::LoggingConfig;
pub use self::redis::RedisConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Database configuration (PostgreSQL connection)
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Redis configuration (cache)
    #[serde(default)]
    pub redis: RedisConfig,

    /// Engine configuration (backend, TTLs, sync cadence)
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `ENTITLEMENT` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `ENTITLEMENT__ENGINE__BACKEND=postgres` -> `engine.backend = postgres`
    /// - `ENTITLEMENT__DATABASE__URL=...` -> `database.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("ENTITLEMENT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// Database and Redis sections are only checked when the selected
    /// backend uses them.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.engine.validate()?;
        self.logging.validate()?;
        if self.engine.backend.needs_database() {
            self.database.validate()?;
        }
        if self.engine.backend.needs_redis() {
            self.redis.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 5] = [
        "ENTITLEMENT__ENGINE__BACKEND",
        "ENTITLEMENT__ENGINE__USAGE_SYNC_EVERY",
        "ENTITLEMENT__DATABASE__URL",
        "ENTITLEMENT__REDIS__URL",
        "ENTITLEMENT__LOGGING__JSON",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_defaults_without_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let config = AppConfig::load().unwrap();

        assert_eq!(config.engine.backend, StoreBackend::Hybrid);
        assert_eq!(config.redis.key_prefix, "entitlement:");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("ENTITLEMENT__ENGINE__BACKEND", "postgres");
        env::set_var("ENTITLEMENT__ENGINE__USAGE_SYNC_EVERY", "3");
        env::set_var("ENTITLEMENT__DATABASE__URL", "postgresql://test@localhost/test");
        env::set_var("ENTITLEMENT__LOGGING__JSON", "true");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.engine.backend, StoreBackend::Postgres);
        assert_eq!(config.engine.usage_sync_every, 3);
        assert_eq!(config.database.url, "postgresql://test@localhost/test");
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_memory_backend_needs_no_urls() {
        let config = AppConfig {
            engine: EngineConfig {
                backend: StoreBackend::Memory,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_hybrid_backend_requires_redis() {
        let config = AppConfig {
            database: DatabaseConfig {
                url: "postgresql://localhost/test".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingRequired("REDIS_URL"))
        ));
    }
}
