//! Counter service and cycle scheduler
//!
//! One cycle = one page of remote sync followed by one chunk of node
//! mirroring. Cycles never overlap: the single-flight guard makes a second
//! caller skip instead of wait, and the `cycle_lease` setting extends that
//! to every process sharing the database.

use crate::config::CounterConfig;
use crate::counter::PageviewCounter;
use crate::error::CounterResult;
use crate::store::settings::keys;
use crate::store::{ExpiringCache, SettingsStore, SqliteStore};
use crate::sync::{
    AnalyticsSource, GaReportingClient, MirrorOutcome, NodeCounterMirror, PaginatedSyncEngine,
    QuotaTracker, SyncOutcome,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// How long a cycle lease stays valid if its holder dies mid-cycle
pub const CYCLE_LEASE_SECS: i64 = 3600;

/// What one `run_cycle` call did
#[derive(Debug, Default)]
pub struct CycleReport {
    pub started_at: i64,
    /// Another cycle (this process or another) was running; nothing ran
    pub skipped: bool,
    pub sync: Option<SyncOutcome>,
    pub sync_error: Option<String>,
    pub mirror: Option<MirrorOutcome>,
    pub mirror_error: Option<String>,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        !self.skipped && self.sync_error.is_none() && self.mirror_error.is_none()
    }
}

pub struct CounterService {
    engine: PaginatedSyncEngine,
    mirror: NodeCounterMirror,
    counter: Arc<PageviewCounter>,
    quota: Arc<QuotaTracker>,
    settings: Arc<dyn SettingsStore>,
    cache: Arc<dyn ExpiringCache>,
    cycle_guard: Mutex<()>,
    /// Lease owner id, unique per service instance
    holder: String,
}

impl CounterService {
    /// Wire every component onto one store and the given remote source
    pub fn build(
        config: &CounterConfig,
        store: SqliteStore,
        source: Arc<dyn AnalyticsSource>,
    ) -> Self {
        let store = Arc::new(store);
        let settings: Arc<dyn SettingsStore> = store.clone();
        let quota = Arc::new(QuotaTracker::new(settings.clone(), config.daily_quota));

        let counter = Arc::new(PageviewCounter::with_store(config, store.clone()));

        let engine = PaginatedSyncEngine::new(
            config,
            source,
            store.clone(),
            store.clone(),
            settings.clone(),
            quota.clone(),
        );
        let mirror = NodeCounterMirror::new(
            counter.clone(),
            store.clone(),
            store.clone(),
            settings.clone(),
            config.chunk_size,
        );
        let cache: Arc<dyn ExpiringCache> = store;

        Self {
            engine,
            mirror,
            counter,
            quota,
            settings,
            cache,
            cycle_guard: Mutex::new(()),
            holder: lease_holder_id(),
        }
    }

    /// Open the configured database and talk to the real analytics API
    pub fn from_config(config: &CounterConfig) -> CounterResult<Self> {
        let store = SqliteStore::open(&config.db_path)?;
        let source: Arc<dyn AnalyticsSource> = Arc::new(GaReportingClient::new(config)?);
        Ok(Self::build(config, store, source))
    }

    pub fn counter(&self) -> Arc<PageviewCounter> {
        self.counter.clone()
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    /// Sync one page, then mirror one chunk
    ///
    /// Failures are logged and reported, never returned: a quota or fetch
    /// failure still lets the mirror run over the data already stored.
    pub async fn run_cycle(&self, now: i64) -> CycleReport {
        let mut report = CycleReport {
            started_at: now,
            ..CycleReport::default()
        };

        let Ok(_guard) = self.cycle_guard.try_lock() else {
            log::warn!("⏭️  Previous cycle still running, skipping");
            report.skipped = true;
            return report;
        };

        match self.settings.try_acquire_lease(
            keys::CYCLE_LEASE,
            &self.holder,
            now,
            CYCLE_LEASE_SECS,
        ) {
            Ok(true) => {}
            Ok(false) => {
                log::warn!("⏭️  Another process is running a cycle, skipping");
                report.skipped = true;
                return report;
            }
            Err(e) => {
                log::error!("❌ Could not take cycle lease: {}", e);
                report.skipped = true;
                return report;
            }
        }

        log::info!("🔄 Starting sync cycle");

        if let Err(e) = self.settings.set_i64(keys::LAST_CYCLE_AT, now) {
            log::warn!("⚠️  Could not record cycle start: {}", e);
        }

        match self.engine.sync_next_page(now).await {
            Ok(outcome) => report.sync = Some(outcome),
            Err(e) => {
                if e.is_transient() {
                    log::warn!("⚠️  Sync skipped this cycle: {}", e);
                } else {
                    log::error!("❌ Sync failed: {}", e);
                }
                report.sync_error = Some(e.to_string());
            }
        }

        match self.mirror.mirror_next_chunk(now) {
            Ok(outcome) => report.mirror = Some(outcome),
            Err(e) => {
                log::error!("❌ Node mirror failed: {}", e);
                report.mirror_error = Some(e.to_string());
            }
        }

        match self.cache.purge_expired(now) {
            Ok(0) => {}
            Ok(purged) => log::debug!("🗑️  Purged {} expired cache entries", purged),
            Err(e) => log::warn!("⚠️  Cache purge failed: {}", e),
        }

        if let Err(e) = self.settings.release_lease(keys::CYCLE_LEASE, &self.holder) {
            log::warn!("⚠️  Could not release cycle lease: {}", e);
        }

        log::info!(
            "✅ Cycle finished (sync: {}, mirror: {})",
            if report.sync.is_some() { "ok" } else { "failed" },
            if report.mirror.is_some() { "ok" } else { "failed" }
        );
        report
    }

    /// Clear cursors, quota window, totals and timings
    ///
    /// Stored pageview rows and node counts are kept.
    pub fn reset_state(&self) -> CounterResult<()> {
        reset_sync_state(self.settings.as_ref())
    }
}

fn lease_holder_id() -> String {
    static INSTANCES: AtomicU64 = AtomicU64::new(0);
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();
    let instance = INSTANCES.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", std::process::id(), nanos, instance)
}

/// Remove every resettable setting from `settings`
pub fn reset_sync_state(settings: &dyn SettingsStore) -> CounterResult<()> {
    for key in keys::RESETTABLE {
        settings.remove_value(key)?;
    }
    log::info!("🧹 Reset sync state ({} settings cleared)", keys::RESETTABLE.len());
    Ok(())
}

/// Run cycles every `interval_secs` until the task is cancelled
pub async fn run_scheduler(service: Arc<CounterService>, interval_secs: u64) {
    log::info!("⏰ Starting cycle scheduler (interval: {}s)", interval_secs);

    let mut timer = interval(Duration::from_secs(interval_secs.max(1)));
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        timer.tick().await;
        let now = chrono::Utc::now().timestamp();
        let report = service.run_cycle(now).await;
        if !report.is_clean() {
            log::debug!("   └─ Cycle report: {:?}", report);
        }
    }
}
