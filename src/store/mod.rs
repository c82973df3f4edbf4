//! SQLite-backed storage for the counter
//!
//! A single `SqliteStore` owns the connection and implements every storage
//! trait the core needs:
//! - `PageviewStore` / `NodeCountStore` (`pageviews`, `node_counts`)
//! - `SettingsStore` (`settings`) - cursors, quota window, totals
//! - `ExpiringCache` (`cache_entries`) - request pages and path sums
//! - `AliasDirectory` / `RedirectDirectory` / `ContentDirectory` - read-only
//!   views of CMS-owned tables
//!
//! Schema lives in `/sql/*.sql` and is embedded at compile time.

pub mod cache;
pub mod directory;
pub mod pageviews;
pub mod settings;

pub use cache::ExpiringCache;
pub use directory::{AliasDirectory, ContentDirectory, Redirect, RedirectDirectory};
pub use pageviews::{NodeCountStore, PageviewRecord, PageviewStore};
pub use settings::{MemorySettingsStore, SettingsStore};

use crate::error::{CounterError, CounterResult};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Schema files, applied in order. Every statement uses IF NOT EXISTS.
const MIGRATIONS: &[(&str, &str)] = &[
    ("01_pageviews.sql", include_str!("../../sql/01_pageviews.sql")),
    ("02_node_counts.sql", include_str!("../../sql/02_node_counts.sql")),
    ("03_settings.sql", include_str!("../../sql/03_settings.sql")),
    ("04_cache_entries.sql", include_str!("../../sql/04_cache_entries.sql")),
    ("05_directories.sql", include_str!("../../sql/05_directories.sql")),
];

const TABLES: &[&str] = &[
    "pageviews",
    "node_counts",
    "settings",
    "cache_entries",
    "content_items",
    "url_aliases",
    "redirects",
];

/// Run schema migrations
///
/// Idempotent: safe to call on every startup.
pub fn run_schema_migrations(conn: &mut Connection) -> CounterResult<()> {
    // Readers (count lookups) keep working while a sync cycle writes
    conn.pragma_update(None, "journal_mode", "WAL")?;
    log::info!("📊 Enabled WAL mode for SQLite database");

    log::info!("🔧 Running schema migrations");

    for (filename, sql) in MIGRATIONS {
        log::debug!("   ├─ Executing: {}", filename);
        conn.execute_batch(sql)?;
    }

    log::info!("✅ All {} schema migrations completed", MIGRATIONS.len());

    Ok(())
}

/// Shared SQLite store
///
/// Cloning is cheap; clones share the same connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database and apply the schema
    pub fn open(db_path: &str) -> CounterResult<Self> {
        let mut conn = Connection::open(db_path)?;
        // Another process (runtime or query tool) may be mid-write
        conn.busy_timeout(Duration::from_secs(5))?;
        run_schema_migrations(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    /// In-memory database with schema applied
    pub fn open_in_memory() -> CounterResult<Self> {
        // No WAL pragma: it does not apply to :memory: databases
        let conn = Connection::open_in_memory()?;
        for (_, sql) in MIGRATIONS {
            conn.execute_batch(sql)?;
        }
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub(crate) fn lock(&self) -> CounterResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CounterError::LockPoisoned("sqlite connection"))
    }

    /// Row count of a table (used by the status report)
    pub fn count_rows(&self, table: &str) -> CounterResult<i64> {
        if !TABLES.contains(&table) {
            return Err(CounterError::Config(format!("unknown table: {}", table)));
        }
        let conn = self.lock()?;
        let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }
}
