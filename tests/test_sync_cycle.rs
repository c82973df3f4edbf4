//! Integration tests: sync + mirror cycles against an on-disk database
//!
//! A scripted analytics source stands in for the reporting API. Tests cover:
//! - Quota bound across a day of cycles, and window rollover
//! - Idempotent merges of the same page
//! - Cursor progress and wrap, surviving a process restart
//! - Failed fetches leaving cursor and quota untouched
//! - Two services on one database never cycle at the same time

#[cfg(test)]
mod sync_cycle_tests {
    use async_trait::async_trait;
    use gacounter::store::settings::keys;
    use gacounter::store::{NodeCountStore, PageviewStore, SettingsStore};
    use gacounter::sync::{AnalyticsSource, QuotaTracker, RemoteError, ReportPage, ReportRequest};
    use gacounter::{CounterConfig, CounterService, SqliteStore};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const NOW: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;

    /// Pages through `/node/<i>` rows; `i` views each
    struct ScriptedSource {
        rows: Vec<(String, i64)>,
        calls: Mutex<u64>,
        failure: Mutex<Option<RemoteError>>,
    }

    impl ScriptedSource {
        fn new(n: usize) -> Arc<Self> {
            Arc::new(Self {
                rows: (1..=n).map(|i| (format!("/node/{}", i), i as i64)).collect(),
                calls: Mutex::new(0),
                failure: Mutex::new(None),
            })
        }

        fn calls(&self) -> u64 {
            *self.calls.lock().unwrap()
        }

        fn fail_with(&self, err: Option<RemoteError>) {
            *self.failure.lock().unwrap() = err;
        }
    }

    #[async_trait]
    impl AnalyticsSource for ScriptedSource {
        async fn fetch_page(&self, request: &ReportRequest) -> Result<ReportPage, RemoteError> {
            if let Some(err) = self.failure.lock().unwrap().clone() {
                return Err(err);
            }
            *self.calls.lock().unwrap() += 1;
            Ok(ReportPage {
                rows: self
                    .rows
                    .iter()
                    .skip((request.start_index - 1) as usize)
                    .take(request.max_results as usize)
                    .cloned()
                    .collect(),
                total_results: self.rows.len() as u64,
                total_pageviews: self.rows.iter().map(|(_, v)| v).sum(),
                from_cache: false,
            })
        }
    }

    fn config(dir: &TempDir, chunk_size: u64, daily_quota: u64) -> CounterConfig {
        CounterConfig {
            db_path: dir.path().join("counter.db").to_string_lossy().to_string(),
            chunk_size,
            daily_quota,
            // Short enough that every cycle in these tests misses the page cache
            cache_ttl_secs: 1,
            profile_id: "42".to_string(),
            ..CounterConfig::default()
        }
    }

    fn service(
        config: &CounterConfig,
        source: Arc<ScriptedSource>,
    ) -> (SqliteStore, CounterService) {
        let store = SqliteStore::open(&config.db_path).unwrap();
        let service = CounterService::build(config, store.clone(), source);
        (store, service)
    }

    #[tokio::test]
    async fn test_fourth_fetch_in_window_is_refused() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 2, 3);
        let source = ScriptedSource::new(20);
        let (store, service) = service(&config, source.clone());

        for i in 0..3 {
            let report = service.run_cycle(NOW + i * 10).await;
            assert!(report.sync.is_some(), "fetch {} should succeed", i + 1);
        }
        let rows_before = store.count_rows("pageviews").unwrap();

        let fourth = service.run_cycle(NOW + 30).await;
        assert!(fourth.sync_error.unwrap().contains("quota"));
        assert_eq!(source.calls(), 3);
        assert_eq!(store.count_rows("pageviews").unwrap(), rows_before);
    }

    #[tokio::test]
    async fn test_quota_bound_holds_for_a_day_then_rolls_over() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 1, 5);
        let source = ScriptedSource::new(100);
        let (_store, service) = service(&config, source.clone());

        // A cycle every 30 minutes for one day
        for i in 0..48 {
            service.run_cycle(NOW + i * 1800).await;
        }
        assert_eq!(source.calls(), 5);

        let report = service.run_cycle(NOW + DAY).await;
        assert!(report.sync.is_some());
        assert_eq!(source.calls(), 6);
    }

    #[tokio::test]
    async fn test_merging_same_page_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        // One page holds everything, so every cycle re-requests it
        let config = config(&dir, 10, 100);
        let source = ScriptedSource::new(4);
        let (store, service) = service(&config, source.clone());

        service.run_cycle(NOW).await;
        let first = store.record_for_path("/node/3").unwrap().unwrap();

        service.run_cycle(NOW + 100).await;
        let second = store.record_for_path("/node/3").unwrap().unwrap();

        assert_eq!(source.calls(), 2);
        assert_eq!(first, second);
        assert_eq!(store.count_rows("pageviews").unwrap(), 4);
        assert_eq!(store.get_i64(keys::TOTAL_HITS, 0).unwrap(), 10);
    }

    #[tokio::test]
    async fn test_cursor_resumes_after_restart() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 3, 100);
        let source = ScriptedSource::new(7);

        {
            let (store, service) = service(&config, source.clone());
            service.run_cycle(NOW).await;
            service.run_cycle(NOW + 10).await;
            assert_eq!(store.get_i64(keys::DATA_STEP, 0).unwrap(), 2);
        }

        // Fresh process, same database file
        let (store, service) = service(&config, source.clone());
        let report = service.run_cycle(NOW + 20).await;
        let sync = report.sync.unwrap();
        assert_eq!(sync.start_index, 7);
        assert_eq!(sync.next_step, 0);
        assert_eq!(store.count_rows("pageviews").unwrap(), 7);

        let quota = QuotaTracker::new(Arc::new(store.clone()), 100);
        assert_eq!(quota.window(NOW + 20).unwrap().calls_made, 3);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_cursor_and_quota() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 2, 100);
        let source = ScriptedSource::new(10);
        let (store, service) = service(&config, source.clone());

        service.run_cycle(NOW).await;
        source.fail_with(Some(RemoteError::Transport("connection reset".to_string())));

        let report = service.run_cycle(NOW + 10).await;
        assert!(report.sync_error.is_some());
        // Mirror still ran over what was stored
        assert!(report.mirror.is_some());
        assert_eq!(store.get_i64(keys::DATA_STEP, 0).unwrap(), 1);
        assert_eq!(service.quota().window(NOW + 10).unwrap().calls_made, 1);

        source.fail_with(None);
        let report = service.run_cycle(NOW + 20).await;
        assert_eq!(report.sync.unwrap().start_index, 3);
    }

    #[tokio::test]
    async fn test_mirror_fills_node_counts() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 10, 100);
        let source = ScriptedSource::new(3);
        let (store, service) = service(&config, source);
        store.add_item(2, "").unwrap();
        store.add_item(3, "").unwrap();
        store.add_item(99, "").unwrap();

        service.run_cycle(NOW).await;

        assert_eq!(store.node_count(2).unwrap(), Some(2));
        assert_eq!(store.node_count(3).unwrap(), Some(3));
        assert_eq!(store.node_count(99).unwrap(), None);
        assert_eq!(store.get_i64(keys::TOTAL_NODES, 0).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_services_sharing_a_database_take_turns() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 2, 100);
        let runtime_source = ScriptedSource::new(5);
        let query_source = ScriptedSource::new(5);
        let (store, runtime) = service(&config, runtime_source.clone());
        let (_query_store, query_tool) = service(&config, query_source.clone());

        // The runtime is mid-cycle when the query tool starts one
        assert!(store
            .try_acquire_lease(keys::CYCLE_LEASE, "runtime-mid-cycle", NOW, 600)
            .unwrap());
        let report = query_tool.run_cycle(NOW + 1).await;
        assert!(report.skipped);
        assert_eq!(query_source.calls(), 0);
        assert_eq!(store.get_i64(keys::DATA_STEP, 0).unwrap(), 0);

        store
            .release_lease(keys::CYCLE_LEASE, "runtime-mid-cycle")
            .unwrap();
        assert!(query_tool.run_cycle(NOW + 2).await.is_clean());
        assert!(runtime.run_cycle(NOW + 3).await.is_clean());

        assert_eq!(query_source.calls() + runtime_source.calls(), 2);
        assert_eq!(store.get_i64(keys::DATA_STEP, 0).unwrap(), 2);
        assert_eq!(runtime.quota().window(NOW + 4).unwrap().calls_made, 2);
    }
}
