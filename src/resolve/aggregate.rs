//! Aggregated pageview sums with TTL caching
//!
//! A resolved path stands for many stored rows: the path itself and each of
//! its aliases, with and without a trailing slash, with and without the
//! language prefix, plus every redirect source pointing at it. The sum over
//! that variant set is cached under `hash(prefix + path)` until the TTL runs
//! out. New pageview data does not invalidate cached sums.

use crate::error::CounterResult;
use crate::hashing::{path_hash, sum_cache_id};
use crate::store::settings::keys;
use crate::store::{
    AliasDirectory, ExpiringCache, PageviewStore, RedirectDirectory, SettingsStore,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Literal path standing for "every path on the profile"
pub const ALL_PATHS: &str = "all";

/// Extra spellings under which the front page shows up in reports
const FRONT_PAGE_SPELLINGS: [&str; 3] = ["", "/", "index.php"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Return a cached sum when one exists
    Use,
    /// Always recompute, then store the fresh sum
    Refresh,
}

pub struct AggregationCache {
    pageviews: Arc<dyn PageviewStore>,
    cache: Arc<dyn ExpiringCache>,
    aliases: Arc<dyn AliasDirectory>,
    redirects: Arc<dyn RedirectDirectory>,
    settings: Arc<dyn SettingsStore>,
    front_page: String,
    ttl_secs: i64,
}

impl AggregationCache {
    pub fn new(
        pageviews: Arc<dyn PageviewStore>,
        cache: Arc<dyn ExpiringCache>,
        aliases: Arc<dyn AliasDirectory>,
        redirects: Arc<dyn RedirectDirectory>,
        settings: Arc<dyn SettingsStore>,
        front_page: &str,
        ttl_secs: i64,
    ) -> Self {
        Self {
            pageviews,
            cache,
            aliases,
            redirects,
            settings,
            front_page: front_page.trim_matches('/').to_string(),
            ttl_secs,
        }
    }

    /// Cached sum for a resolved path
    pub fn sum_for(
        &self,
        canonical_path: &str,
        language_prefix: &str,
        now: i64,
    ) -> CounterResult<i64> {
        self.sum_for_with(canonical_path, language_prefix, CacheMode::Use, now)
    }

    /// Like `sum_for`, with `"all"` answered from the stored profile total
    pub fn sum_for_with(
        &self,
        canonical_path: &str,
        language_prefix: &str,
        mode: CacheMode,
        now: i64,
    ) -> CounterResult<i64> {
        if canonical_path == ALL_PATHS {
            return self.settings.get_i64(keys::TOTAL_HITS, 0);
        }
        self.sum_variants_with(canonical_path, language_prefix, mode, now)
    }

    /// Sum over the variant set of a path, never taking the `"all"` shortcut
    ///
    /// Resolved request paths go through here: a page literally at `/all`
    /// resolves to `all` and must count its own rows.
    pub fn sum_variants_with(
        &self,
        canonical_path: &str,
        language_prefix: &str,
        mode: CacheMode,
        now: i64,
    ) -> CounterResult<i64> {
        let path = self.normalize(canonical_path);
        let cid = sum_cache_id(language_prefix, &path);

        if mode == CacheMode::Use {
            if let Some(sum) = self.cache.get(&cid, now)?.and_then(|v| v.as_i64()) {
                return Ok(sum);
            }
        }

        let variants = self.variant_set(&path, language_prefix)?;
        let hashes: Vec<String> = variants.iter().map(|v| path_hash(v)).collect();
        let sum = self.pageviews.sum_for_hashes(&hashes)?;

        log::debug!(
            "🧮 {} variants of '{}' (lang: '{}') sum to {}",
            variants.len(),
            path,
            language_prefix,
            sum
        );

        self.cache.set(&cid, &Value::from(sum), now + self.ttl_secs)?;
        Ok(sum)
    }

    /// Every stored path spelling counted for `canonical_path`
    ///
    /// Spellings carry the leading slash the analytics service records.
    pub fn variant_set(
        &self,
        canonical_path: &str,
        language_prefix: &str,
    ) -> CounterResult<Vec<String>> {
        let path = self.normalize(canonical_path);
        let mut variants = VariantSet::default();

        let prefix = if language_prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", language_prefix)
        };

        for spelling in self.path_aliases(&path)? {
            variants.push(format!("/{}{}", prefix, spelling));
            variants.push(format!("/{}{}/", prefix, spelling));
            if !prefix.is_empty() {
                // Views recorded before the item had a language
                variants.push(format!("/{}", spelling));
                variants.push(format!("/{}/", spelling));
            }
        }

        for redirect in self.redirects.redirects_to(&path)? {
            variants.push(format!("/{}", redirect.source));
            variants.push(format!("/{}/", redirect.source));
            if !redirect.language.is_empty() {
                variants.push(format!("/{}/{}", redirect.language, redirect.source));
                variants.push(format!("/{}/{}/", redirect.language, redirect.source));
            }
        }

        Ok(variants.into_vec())
    }

    /// The canonical path plus all of its aliases
    fn path_aliases(&self, path: &str) -> CounterResult<Vec<String>> {
        let source = self
            .aliases
            .resolve_alias_to_path(path)?
            .unwrap_or_else(|| path.to_string());

        let mut spellings = vec![source.clone()];
        spellings.extend(self.aliases.aliases_of(&source)?);

        if source == self.front_page {
            spellings.extend(FRONT_PAGE_SPELLINGS.iter().map(|s| s.to_string()));
        }
        Ok(spellings)
    }

    /// Strip slashes; an empty path is the front page
    fn normalize(&self, path: &str) -> String {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            self.front_page.clone()
        } else {
            trimmed.to_string()
        }
    }
}

/// Insertion-ordered set of spellings
#[derive(Default)]
struct VariantSet {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl VariantSet {
    fn push(&mut self, variant: String) {
        if self.seen.insert(variant.clone()) {
            self.ordered.push(variant);
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.ordered
    }
}
