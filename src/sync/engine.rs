//! Paginated sync engine
//!
//! Pulls one page of `(path, pageviews)` rows per invocation and merges it
//! into the `pageviews` table.
//!
//! ## Cycle
//!
//! ```text
//! cursor (data_step) ──► ReportRequest ──► response cache? ──hit──┐
//!                                              │ miss             │
//!                                     quota check (QuotaExceeded) │
//!                                              │                  │
//!                                     AnalyticsSource::fetch_page │
//!                                              │                  │
//!                                        record_call              │
//!                                              │                  │
//!                                   merge rows (one transaction)  │
//!                                              │                  │
//!                                         cache page              │
//!                                              ▼                  │
//!                          totals ◄────────────┴──────────────────┘
//!                             │
//!                    cursor advance / wrap
//! ```
//!
//! A failed fetch leaves the cursor and quota window exactly as they were.
//! A fetched page enters the response cache only after its rows are merged,
//! so pages served from the cache are never merged again and do not touch
//! the quota.

use super::cursor::Cursor;
use super::quota::QuotaTracker;
use super::source::{AnalyticsSource, Lookback, RemoteError, ReportPage, ReportRequest};
use crate::config::CounterConfig;
use crate::error::{CounterError, CounterResult};
use crate::store::settings::keys;
use crate::store::{ExpiringCache, PageviewRecord, PageviewStore, SettingsStore};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Instant;

/// Result of one `sync_next_page` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Rows merged into `pageviews` (0 for cached pages)
    pub records_written: usize,
    pub elapsed_secs: u64,
    pub from_cache: bool,
    /// 1-based index of the first row requested
    pub start_index: u64,
    pub total_results: u64,
    pub total_pageviews: i64,
    /// Cursor step for the next cycle
    pub next_step: u64,
}

pub struct PaginatedSyncEngine {
    source: Arc<dyn AnalyticsSource>,
    pageviews: Arc<dyn PageviewStore>,
    cache: Arc<dyn ExpiringCache>,
    settings: Arc<dyn SettingsStore>,
    quota: Arc<QuotaTracker>,
    profile_id: String,
    chunk_size: u64,
    lookback: Lookback,
    cache_ttl_secs: i64,
}

impl PaginatedSyncEngine {
    pub fn new(
        config: &CounterConfig,
        source: Arc<dyn AnalyticsSource>,
        pageviews: Arc<dyn PageviewStore>,
        cache: Arc<dyn ExpiringCache>,
        settings: Arc<dyn SettingsStore>,
        quota: Arc<QuotaTracker>,
    ) -> Self {
        Self {
            source,
            pageviews,
            cache,
            settings,
            quota,
            profile_id: config.profile_id.clone(),
            chunk_size: config.chunk_size.max(1),
            lookback: Lookback::from_secs(config.lookback_secs),
            cache_ttl_secs: config.cache_ttl_secs,
        }
    }

    /// Request the current cursor position would issue at `now`
    pub fn next_request(&self, now: i64) -> CounterResult<ReportRequest> {
        let cursor = Cursor::load(self.settings.as_ref(), keys::DATA_STEP)?;
        Ok(ReportRequest::pageviews_by_path(
            &self.profile_id,
            self.lookback,
            day_of(now),
            cursor.start_index(self.chunk_size),
            self.chunk_size,
        ))
    }

    /// Fetch and merge one page
    ///
    /// Errors:
    /// - `QuotaExceeded` - budget used up; nothing fetched, nothing written
    /// - `RemoteFetch` / `Auth` - fetch failed; cursor and quota untouched
    pub async fn sync_next_page(&self, now: i64) -> CounterResult<SyncOutcome> {
        let cycle_start = Instant::now();

        let mut cursor = Cursor::load(self.settings.as_ref(), keys::DATA_STEP)?;
        let start_index = cursor.start_index(self.chunk_size);
        let request = ReportRequest::pageviews_by_path(
            &self.profile_id,
            self.lookback,
            day_of(now),
            start_index,
            self.chunk_size,
        );
        let cid = request.cache_id()?;

        let page = match self.cached_page(&cid, now)? {
            Some(page) => {
                log::debug!("💾 Page {} served from response cache", start_index);
                page
            }
            None => self.fetch_live(&request, now).await?,
        };

        let records_written = if page.from_cache {
            0
        } else {
            let records: Vec<PageviewRecord> = page
                .rows
                .iter()
                .map(|(path, views)| PageviewRecord::new(path.as_str(), *views))
                .collect();
            let written = self.pageviews.merge_records(&records)?;
            // Only a merged page may be served from cache later
            self.cache
                .set(&cid, &serde_json::to_value(&page)?, now + self.cache_ttl_secs)?;
            written
        };

        // Reporting counters only; per-path lookups never read them
        self.settings
            .set_i64(keys::TOTAL_PATHS, page.total_results as i64)?;
        self.settings.set_i64(keys::TOTAL_HITS, page.total_pageviews)?;

        let pointer = start_index + self.chunk_size - 1;
        cursor.advance_or_wrap(pointer, page.total_results);
        cursor.save(self.settings.as_ref(), keys::DATA_STEP)?;

        let elapsed_secs = cycle_start.elapsed().as_secs();
        self.settings
            .set_i64(keys::SYNC_PROCESS_SECS, elapsed_secs as i64)?;

        log::info!(
            "📥 Retrieved {} items from analytics for paths {}-{}{}",
            page.rows.len(),
            start_index,
            start_index + page.rows.len().saturating_sub(1) as u64,
            if page.from_cache { " (cached)" } else { "" }
        );
        log::info!(
            "   └─ Total paths: {}, next step: {}",
            page.total_results,
            cursor.step
        );

        Ok(SyncOutcome {
            records_written,
            elapsed_secs,
            from_cache: page.from_cache,
            start_index,
            total_results: page.total_results,
            total_pageviews: page.total_pageviews,
            next_step: cursor.step,
        })
    }

    fn cached_page(&self, cid: &str, now: i64) -> CounterResult<Option<ReportPage>> {
        let Some(value) = self.cache.get(cid, now)? else {
            return Ok(None);
        };

        match serde_json::from_value::<ReportPage>(value) {
            Ok(mut page) => {
                page.from_cache = true;
                Ok(Some(page))
            }
            Err(e) => {
                // Unreadable entry: treat as a miss, the live fetch overwrites it
                log::warn!("⚠️  Ignoring undecodable cached page {}: {}", cid, e);
                Ok(None)
            }
        }
    }

    async fn fetch_live(&self, request: &ReportRequest, now: i64) -> CounterResult<ReportPage> {
        self.quota.ensure_can_fetch(now)?;

        let page = self.source.fetch_page(request).await.map_err(|e| {
            log::error!(
                "❌ Problem fetching analytics data ({} to {}, rows {}-{}): {}",
                request.start_date,
                request.end_date,
                request.start_index,
                request.start_index + request.max_results - 1,
                e
            );
            match e {
                RemoteError::Auth(msg) => CounterError::Auth(msg),
                RemoteError::Transport(msg) => CounterError::RemoteFetch(msg),
            }
        })?;

        self.quota.record_call(now)?;
        Ok(page)
    }
}

fn day_of(now: i64) -> NaiveDate {
    DateTime::<Utc>::from_timestamp(now, 0)
        .map(|dt| dt.date_naive())
        .unwrap_or_default()
}
