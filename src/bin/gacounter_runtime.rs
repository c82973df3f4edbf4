//! Pageview counter runtime
//!
//! Runs sync + mirror cycles on a fixed interval until CTRL+C:
//! - Applies the SQLite schema (idempotent)
//! - Connects to the analytics reporting API
//! - Ticks the cycle scheduler
//!
//! Usage:
//!   cargo run --release --bin gacounter_runtime
//!
//! Environment variables:
//!   GACOUNTER_DB_PATH - SQLite database path (default: gacounter.db)
//!   GACOUNTER_PROFILE_ID - Analytics profile (view) id (required)
//!   GACOUNTER_ACCESS_TOKEN - OAuth bearer token (required)
//!   GACOUNTER_SYNC_INTERVAL_SECS - Cycle interval (default: 1800)
//!   GACOUNTER_CHUNK_SIZE - Rows per page / items per mirror chunk (default: 1000)
//!   GACOUNTER_DAILY_QUOTA - API calls per 24h window (default: 10000)

use dotenv::dotenv;
use gacounter::{run_scheduler, CounterConfig, CounterService};
use log::{error, info};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    gacounter::config::log_builder().init();

    info!("🚀 Pageview counter runtime");
    info!("   └─ Version: {}", env!("CARGO_PKG_VERSION"));

    let config = CounterConfig::from_env();
    if let Err(e) = config.validate_remote() {
        error!("❌ {}", e);
        info!("   └─ Set the missing variables (or a .env file) and restart");
        return Err(e.into());
    }

    info!("✅ Configuration loaded");
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Profile: ga:{}", config.profile_id);
    info!("   ├─ Chunk size: {}", config.chunk_size);
    info!("   ├─ Daily quota: {} calls", config.daily_quota);
    info!("   ├─ Cache TTL: {}s", config.cache_ttl_secs);
    info!("   └─ Cycle interval: {}s", config.sync_interval_secs);

    info!("🔧 Initializing database...");
    let service = Arc::new(CounterService::from_config(&config)?);
    info!("✅ Database initialized");

    let scheduler = tokio::spawn(run_scheduler(service.clone(), config.sync_interval_secs));

    info!("🔄 Press CTRL+C to shutdown gracefully");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("");
            info!("⚠️  Received CTRL+C, shutting down...");
        }
        Err(err) => {
            error!("❌ Failed to listen for CTRL+C: {}", err);
        }
    }

    scheduler.abort();

    info!("✅ Pageview counter runtime stopped");
    Ok(())
}
