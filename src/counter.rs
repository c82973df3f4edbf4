//! Count lookups for arbitrary request paths

use crate::config::CounterConfig;
use crate::error::CounterResult;
use crate::resolve::{AggregationCache, CacheMode, PathResolver, ResolvedPath, ALL_PATHS};
use crate::store::SqliteStore;
use std::sync::Arc;

/// Resolve-then-sum entry point used by displays and the node mirror
pub struct PageviewCounter {
    resolver: Arc<PathResolver>,
    aggregation: Arc<AggregationCache>,
}

impl PageviewCounter {
    pub fn new(resolver: Arc<PathResolver>, aggregation: Arc<AggregationCache>) -> Self {
        Self {
            resolver,
            aggregation,
        }
    }

    /// Resolver and aggregation both backed by `store`
    pub fn with_store(config: &CounterConfig, store: Arc<SqliteStore>) -> Self {
        let resolver = PathResolver::new(
            store.clone(),
            store.clone(),
            store.clone(),
            &config.front_page,
            config.languages.clone(),
        );
        let aggregation = AggregationCache::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            &config.front_page,
            config.cache_ttl_secs,
        );
        Self::new(Arc::new(resolver), Arc::new(aggregation))
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn aggregation(&self) -> &AggregationCache {
        &self.aggregation
    }

    /// Pageviews for `raw_path`, served from cache when possible
    pub fn count(&self, raw_path: &str, now: i64) -> CounterResult<i64> {
        self.count_with(raw_path, CacheMode::Use, now)
    }

    pub fn count_with(&self, raw_path: &str, mode: CacheMode, now: i64) -> CounterResult<i64> {
        if raw_path == ALL_PATHS {
            return self.aggregation.sum_for_with(ALL_PATHS, "", mode, now);
        }

        let ResolvedPath {
            canonical_path,
            language_prefix,
        } = self.resolver.resolve(raw_path)?;

        self.aggregation
            .sum_variants_with(&canonical_path, &language_prefix, mode, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::settings::keys;
    use crate::store::{PageviewRecord, PageviewStore, SettingsStore, SqliteStore};

    const NOW: i64 = 1_700_000_000;

    fn counter(store: &SqliteStore) -> PageviewCounter {
        let config = CounterConfig {
            front_page: "node/1".to_string(),
            cache_ttl_secs: 3600,
            ..CounterConfig::default()
        };
        PageviewCounter::with_store(&config, Arc::new(store.clone()))
    }

    #[test]
    fn test_every_spelling_of_an_item_counts_the_same() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.add_item(5, "en").unwrap();
        store.add_alias("node/5", "about", "en").unwrap();
        store
            .merge_records(&[
                PageviewRecord::new("/node/5", 10),
                PageviewRecord::new("/en/node/5", 3),
                PageviewRecord::new("/en/about", 4),
            ])
            .unwrap();
        let counter = counter(&store);

        let by_id = counter.count("/node/5", NOW).unwrap();
        assert_eq!(by_id, 17);
        assert_eq!(counter.count("/en/node/5", NOW).unwrap(), by_id);
        assert_eq!(counter.count("/about", NOW).unwrap(), by_id);
        assert_eq!(counter.count("/en/about/", NOW).unwrap(), by_id);
    }

    #[test]
    fn test_all_shortcut() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_i64(keys::TOTAL_HITS, 999).unwrap();
        assert_eq!(counter(&store).count("all", NOW).unwrap(), 999);
    }

    #[test]
    fn test_page_named_all_counts_its_own_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_i64(keys::TOTAL_HITS, 5000).unwrap();
        store
            .merge_records(&[PageviewRecord::new("/all", 7), PageviewRecord::new("/all/", 1)])
            .unwrap();
        let counter = counter(&store);

        assert_eq!(counter.count("/all", NOW).unwrap(), 8);
        assert_eq!(counter.count("/all/", NOW).unwrap(), 8);
        assert_eq!(counter.count("all", NOW).unwrap(), 5000);
    }

    #[test]
    fn test_front_page_forms() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .merge_records(&[PageviewRecord::new("/", 5), PageviewRecord::new("/en", 2)])
            .unwrap();
        let counter = counter(&store);

        let front = counter.count("/", NOW).unwrap();
        assert_eq!(front, 5);
        assert_eq!(counter.count("", NOW).unwrap(), front);
        assert_eq!(counter.count("/en", NOW).unwrap(), front);
        assert_eq!(counter.count("/node/1", NOW).unwrap(), front);
    }
}
