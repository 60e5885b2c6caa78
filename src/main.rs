//! Operator CLI over the entitlement engine.
//!
//! Store selection and connection settings come from the environment (see
//! `AppConfig`). Results print to stdout as JSON; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use entitlement_engine::config::AppConfig;
use entitlement_engine::domain::foundation::UserId;
use entitlement_engine::domain::membership::{
    BoostPackConfig, BoostPackType, MembershipTier, TierConfig,
};
use entitlement_engine::engine::{self, EntitlementEngine};
use entitlement_engine::telemetry;

#[derive(Parser)]
#[command(name = "entitlement-engine")]
#[command(about = "Membership tiers, daily quotas and boost packs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,

    /// List the tier catalog
    Tiers,

    /// List the boost pack catalog
    Packs,

    /// Show a user's membership and enabled features
    Info { user: UserId },

    /// Show a user's quota for today
    Quota { user: UserId },

    /// Check whether a user may use a feature
    Check { user: UserId, feature: String },

    /// Consume one video from a user's quota
    Consume { user: UserId },

    /// Purchase a boost pack (small, medium, large)
    Purchase { user: UserId, pack: BoostPackType },

    /// Set a user's tier
    SetTier {
        user: UserId,
        tier: MembershipTier,

        /// Validity in days; open-ended when omitted
        #[arg(long)]
        days: Option<u32>,
    },

    /// Replace a user's boost pack
    GrantBoost {
        user: UserId,
        videos: i64,
        days: i64,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load().context("failed to load configuration")?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    telemetry::init_tracing(&config.logging).context("failed to install tracing subscriber")?;

    let result = run(cli.command, &config).await;
    if let Err(e) = &result {
        error!(error = %e, "Command failed");
    }
    result
}

async fn run(command: Commands, config: &AppConfig) -> Result<()> {
    // catalog commands need no store
    match command {
        Commands::Migrate => {
            engine::migrate(&config.database).await?;
            return print_json(&json!({ "migrated": true }));
        }
        Commands::Tiers => return print_json(&TierConfig::all()),
        Commands::Packs => return print_json(&BoostPackConfig::all()),
        _ => {}
    }

    let engine = EntitlementEngine::from_config(config)
        .await
        .context("failed to start entitlement engine")?;

    match command {
        Commands::Info { user } => {
            let summary = engine.checker.membership_summary(&user).await?;
            let features = engine.checker.available_features(&user).await?;
            print_json(&json!({ "membership": summary, "features": features }))
        }
        Commands::Quota { user } => print_json(&engine.quota.get_quota_info(&user).await?),
        Commands::Check { user, feature } => {
            print_json(&engine.checker.can_use_feature(&user, &feature).await?)
        }
        Commands::Consume { user } => print_json(&engine.quota.consume_quota(&user).await?),
        Commands::Purchase { user, pack } => {
            print_json(&engine.boost_packs.purchase(&user, pack).await?)
        }
        Commands::SetTier { user, tier, days } => {
            print_json(&engine.admin.set_tier(&user, tier, days).await?)
        }
        Commands::GrantBoost { user, videos, days } => {
            print_json(&engine.admin.grant_boost_pack(&user, videos, days).await?)
        }
        Commands::Migrate | Commands::Tiers | Commands::Packs => Ok(()),
    }
}
