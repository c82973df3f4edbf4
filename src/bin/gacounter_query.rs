//! Pageview counter query tool
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin gacounter_query -- count /en/about
//! cargo run --bin gacounter_query -- count all
//! cargo run --bin gacounter_query -- status
//! cargo run --bin gacounter_query -- sync
//! cargo run --bin gacounter_query -- reset
//! ```
//!
//! `count` and `status` never call the analytics API. `count` may store the
//! computed sum in the local response cache; `status` does not write. `sync`
//! runs one cycle against the analytics API and needs the same variables as
//! the runtime.

use dotenv::dotenv;
use gacounter::{
    reset_sync_state, CounterConfig, CounterService, PageviewCounter, SqliteStore, StatusReport,
};
use std::sync::Arc;

const USAGE: &str = "Usage: gacounter_query <count <path> | status | sync | reset>";

enum Command {
    Count(String),
    Status,
    Sync,
    Reset,
}

impl Command {
    fn from_args() -> Result<Self, Box<dyn std::error::Error>> {
        let args: Vec<String> = std::env::args().skip(1).collect();

        match args.first().map(String::as_str) {
            Some("count") => {
                let path = args
                    .get(1)
                    .ok_or("Missing <path> for count. Use / for the front page")?;
                Ok(Command::Count(path.clone()))
            }
            Some("status") => Ok(Command::Status),
            Some("sync") => Ok(Command::Sync),
            Some("reset") => Ok(Command::Reset),
            _ => Err(USAGE.into()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    gacounter::config::log_builder().init();

    let command = Command::from_args()?;
    let config = CounterConfig::from_env();
    let now = chrono::Utc::now().timestamp();

    match command {
        Command::Count(path) => {
            let store = Arc::new(SqliteStore::open(&config.db_path)?);
            let count = PageviewCounter::with_store(&config, store).count(&path, now)?;
            println!("{}", count);
        }
        Command::Status => {
            let store = SqliteStore::open(&config.db_path)?;
            println!("{}", StatusReport::collect(&store, &config, now)?);
        }
        Command::Sync => {
            let service = CounterService::from_config(&config)?;
            let report = service.run_cycle(now).await;
            if let Some(sync) = &report.sync {
                println!(
                    "📥 Sync: {} rows written from index {}{}",
                    sync.records_written,
                    sync.start_index,
                    if sync.from_cache { " (cached)" } else { "" }
                );
            }
            if let Some(err) = &report.sync_error {
                println!("⚠️  Sync: {}", err);
            }
            if let Some(mirror) = &report.mirror {
                println!(
                    "🗂️  Mirror: {} items processed, {} written",
                    mirror.items_processed, mirror.items_written
                );
            }
            if let Some(err) = &report.mirror_error {
                println!("❌ Mirror: {}", err);
            }
        }
        Command::Reset => {
            let store = SqliteStore::open(&config.db_path)?;
            reset_sync_state(&store)?;
            println!("🧹 Sync state cleared");
        }
    }

    Ok(())
}
