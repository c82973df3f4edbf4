//! Status report for operators

use crate::config::CounterConfig;
use crate::error::CounterResult;
use crate::store::settings::keys;
use crate::store::{SettingsStore, SqliteStore};
use crate::sync::QuotaTracker;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub total_hits: i64,
    pub total_paths: i64,
    pub stored_paths: i64,
    pub total_items: i64,
    pub items_with_counts: i64,
    pub calls_made: u64,
    pub daily_quota: u64,
    /// `None` once the budget is used up
    pub remaining_calls: Option<u64>,
    pub window_resets_in_secs: i64,
    pub sync_process_secs: i64,
    pub mirror_process_secs: i64,
    pub chunk_size: u64,
}

impl StatusReport {
    pub fn collect(store: &SqliteStore, config: &CounterConfig, now: i64) -> CounterResult<Self> {
        let quota = QuotaTracker::new(Arc::new(store.clone()), config.daily_quota);
        let window = quota.snapshot(now)?;

        Ok(Self {
            total_hits: store.get_i64(keys::TOTAL_HITS, 0)?,
            total_paths: store.get_i64(keys::TOTAL_PATHS, 0)?,
            stored_paths: store.count_rows("pageviews")?,
            total_items: store.get_i64(keys::TOTAL_NODES, 0)?,
            items_with_counts: store.count_rows("node_counts")?,
            calls_made: window.calls_made,
            daily_quota: config.daily_quota,
            remaining_calls: quota.remaining(now)?,
            window_resets_in_secs: quota.resets_in(now)?,
            sync_process_secs: store.get_i64(keys::SYNC_PROCESS_SECS, 0)?,
            mirror_process_secs: store.get_i64(keys::MIRROR_PROCESS_SECS, 0)?,
            chunk_size: config.chunk_size,
        })
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let remaining = self
            .remaining_calls
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());

        writeln!(f, "📊 Pageview counter status")?;
        writeln!(f, "   ├─ Total pageviews: {}", self.total_hits)?;
        writeln!(
            f,
            "   ├─ Paths: {} reported, {} stored",
            self.total_paths, self.stored_paths
        )?;
        writeln!(
            f,
            "   ├─ Items: {} known, {} with counts",
            self.total_items, self.items_with_counts
        )?;
        writeln!(
            f,
            "   ├─ API calls: {}/{} used, {} remaining, window resets in {}",
            self.calls_made,
            self.daily_quota,
            remaining,
            format_hms(self.window_resets_in_secs)
        )?;
        writeln!(
            f,
            "   ├─ Last sync chunk ({} paths): {}",
            self.chunk_size,
            format_hms(self.sync_process_secs)
        )?;
        write!(
            f,
            "   └─ Last mirror chunk ({} items): {}",
            self.chunk_size,
            format_hms(self.mirror_process_secs)
        )
    }
}

/// `3725` → `"1h 02m 05s"`
pub fn format_hms(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}
