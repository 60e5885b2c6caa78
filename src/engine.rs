//! Composition root - wires the configured store into the services.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::adapters::postgres::{create_pool, run_migrations};
use crate::adapters::{
    CacheSettings, HybridMembershipStore, HybridSettings, InMemoryMembershipStore,
    PostgresMembershipStore, RedisMembershipStore,
};
use crate::application::{AdminService, BoostPackService, FeatureChecker, QuotaService};
use crate::config::{AppConfig, DatabaseConfig, EngineConfig, StoreBackend, ValidationError};
use crate::ports::MembershipStore;

/// Errors raised while assembling the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("cache connection failed: {0}")]
    Cache(#[from] redis::RedisError),
}

/// The services, sharing one store.
#[derive(Clone)]
pub struct EntitlementEngine {
    pub store: Arc<dyn MembershipStore>,
    pub checker: FeatureChecker,
    pub quota: QuotaService,
    pub boost_packs: BoostPackService,
    pub admin: AdminService,
}

impl EntitlementEngine {
    /// Build the services over an existing store.
    pub fn with_store(store: Arc<dyn MembershipStore>, config: &EngineConfig) -> Self {
        let checker = FeatureChecker::new(Arc::clone(&store))
            .with_unknown_features(config.allow_unknown_features);
        Self {
            quota: QuotaService::new(Arc::clone(&store), checker.clone()),
            boost_packs: BoostPackService::new(Arc::clone(&store)),
            admin: AdminService::new(Arc::clone(&store)),
            checker,
            store,
        }
    }

    /// Validate `config`, connect the selected backend and build the services.
    pub async fn from_config(config: &AppConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let store = build_store(config).await?;
        info!(backend = ?config.engine.backend, "Entitlement engine ready");
        Ok(Self::with_store(store, &config.engine))
    }
}

async fn build_store(config: &AppConfig) -> Result<Arc<dyn MembershipStore>, EngineError> {
    let engine = &config.engine;

    let store: Arc<dyn MembershipStore> = match engine.backend {
        StoreBackend::Memory => Arc::new(InMemoryMembershipStore::new()),
        StoreBackend::Postgres => Arc::new(connect_durable(&config.database).await?),
        StoreBackend::Hybrid => {
            let durable = Arc::new(connect_durable(&config.database).await?);
            let conn = crate::adapters::redis::connect(&config.redis).await?;
            let cache = Arc::new(RedisMembershipStore::new(
                conn,
                CacheSettings {
                    key_prefix: config.redis.key_prefix.clone(),
                    membership_ttl: engine.membership_cache_ttl(),
                    usage_ttl: engine.usage_ttl(),
                    op_timeout: config.redis.timeout(),
                },
            ));
            info!(prefix = %config.redis.key_prefix, "Connected to cache");
            Arc::new(HybridMembershipStore::new(
                durable,
                cache,
                HybridSettings {
                    usage_sync_every: engine.usage_sync_every,
                    cache_refresh_timeout: engine.cache_refresh_timeout(),
                    usage_sync_timeout: engine.usage_sync_timeout(),
                },
            ))
        }
    };
    Ok(store)
}

async fn connect_durable(config: &DatabaseConfig) -> Result<PostgresMembershipStore, EngineError> {
    let pool = create_pool(config).await?;
    if config.run_migrations {
        run_migrations(&pool).await?;
    }
    Ok(PostgresMembershipStore::new(pool, config.statement_timeout()))
}

/// Apply pending migrations to the configured database.
pub async fn migrate(config: &DatabaseConfig) -> Result<(), EngineError> {
    config.validate()?;
    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;
    Ok(())
}
