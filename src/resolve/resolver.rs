//! Path resolver
//!
//! Turns an arbitrary request path into `(canonical_path, language_prefix)`.
//! Resolution is a fixed pipeline of stages, run in order:
//!
//! 1. strip one leading slash
//! 2. front-page equivalents (``, `/`, bare language code) → front page
//! 3. item path (`node/5`, `en/node/5`) → item language becomes the prefix
//! 4. `<lang>/<alias>` → aliased path, `<lang>` becomes the prefix
//! 5. bare alias → aliased path (+ item language if it is an item path)
//! 6. redirect → target path and redirect language
//!
//! Stages 4 and 5 only run while no prefix has been found. First match
//! wins; nothing is scored.

use super::matchers::{
    is_front_page_alias, is_meaningful_language, item_path, match_item_path,
    match_language_prefixed, strip_leading_slash,
};
use crate::error::CounterResult;
use crate::store::{AliasDirectory, ContentDirectory, RedirectDirectory};
use std::sync::Arc;

/// Resolver output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// No leading/trailing slashes, no language prefix
    pub canonical_path: String,
    /// Bare language code (`en`), or "" when none
    pub language_prefix: String,
}

/// Working state threaded through the stages
#[derive(Debug)]
struct Resolution {
    path: String,
    /// Path as it looked after front-page substitution
    shaped: String,
    language: Option<String>,
}

type Stage = fn(&PathResolver, &mut Resolution) -> CounterResult<()>;

const STAGES: [(&str, Stage); 6] = [
    ("strip_leading_slash", PathResolver::stage_strip_slash),
    ("front_page", PathResolver::stage_front_page),
    ("item_path", PathResolver::stage_item_path),
    ("prefixed_alias", PathResolver::stage_prefixed_alias),
    ("bare_alias", PathResolver::stage_bare_alias),
    ("redirect", PathResolver::stage_redirect),
];

pub struct PathResolver {
    aliases: Arc<dyn AliasDirectory>,
    redirects: Arc<dyn RedirectDirectory>,
    content: Arc<dyn ContentDirectory>,
    front_page: String,
    languages: Vec<String>,
}

impl PathResolver {
    pub fn new(
        aliases: Arc<dyn AliasDirectory>,
        redirects: Arc<dyn RedirectDirectory>,
        content: Arc<dyn ContentDirectory>,
        front_page: &str,
        languages: Vec<String>,
    ) -> Self {
        Self {
            aliases,
            redirects,
            content,
            front_page: front_page.trim_matches('/').to_string(),
            languages,
        }
    }

    pub fn front_page(&self) -> &str {
        &self.front_page
    }

    pub fn resolve(&self, raw_path: &str) -> CounterResult<ResolvedPath> {
        let mut resolution = Resolution {
            path: raw_path.to_string(),
            shaped: String::new(),
            language: None,
        };

        for (name, stage) in STAGES.iter() {
            let before = (resolution.path.clone(), resolution.language.clone());
            stage(self, &mut resolution)?;
            if (&resolution.path, &resolution.language) != (&before.0, &before.1) {
                log::debug!(
                    "🔀 {}: '{}' → '{}' (lang: {:?})",
                    name,
                    before.0,
                    resolution.path,
                    resolution.language
                );
            }
        }

        Ok(ResolvedPath {
            canonical_path: resolution.path.trim_matches('/').to_string(),
            language_prefix: resolution.language.unwrap_or_default(),
        })
    }

    fn stage_strip_slash(&self, r: &mut Resolution) -> CounterResult<()> {
        r.path = strip_leading_slash(&r.path).to_string();
        Ok(())
    }

    fn stage_front_page(&self, r: &mut Resolution) -> CounterResult<()> {
        if is_front_page_alias(&r.path, &self.languages) {
            r.path = self.front_page.clone();
        }
        r.shaped = r.path.clone();
        Ok(())
    }

    fn stage_item_path(&self, r: &mut Resolution) -> CounterResult<()> {
        let Some(item) = match_item_path(&r.shaped) else {
            return Ok(());
        };

        if let Some(language) = self.item_language(item.item_id)? {
            r.language = Some(language);
            if item.language_segment.is_some() {
                r.path = item_path(item.item_id);
            }
        }
        Ok(())
    }

    fn stage_prefixed_alias(&self, r: &mut Resolution) -> CounterResult<()> {
        if r.language.is_some() {
            return Ok(());
        }
        let Some(prefixed) = match_language_prefixed(&r.shaped) else {
            return Ok(());
        };

        if let Some(path) = self.aliases.resolve_alias_to_path(&prefixed.rest)? {
            r.path = path;
            r.language = Some(prefixed.language);
        }
        Ok(())
    }

    fn stage_bare_alias(&self, r: &mut Resolution) -> CounterResult<()> {
        if r.language.is_some() {
            return Ok(());
        }

        let lookup = r.path.trim_matches('/').to_string();
        let Some(path) = self.aliases.resolve_alias_to_path(&lookup)? else {
            return Ok(());
        };

        if let Some(item) = match_item_path(&path).filter(|m| m.language_segment.is_none()) {
            r.language = self.item_language(item.item_id)?;
        }
        r.path = path;
        Ok(())
    }

    fn stage_redirect(&self, r: &mut Resolution) -> CounterResult<()> {
        let lookup = r.path.trim_matches('/').to_string();
        let Some(redirect) = self.redirects.redirect_for(&lookup)? else {
            return Ok(());
        };

        if !redirect.target.is_empty() {
            r.path = redirect.target;
        }
        if !redirect.language.is_empty() {
            r.language = Some(redirect.language);
        }
        Ok(())
    }

    /// Item language worth prefixing, `None` for missing/empty/undetermined
    fn item_language(&self, item_id: i64) -> CounterResult<Option<String>> {
        Ok(self
            .content
            .language_of(item_id)?
            .filter(|code| is_meaningful_language(code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn resolver(store: &SqliteStore) -> PathResolver {
        let store = Arc::new(store.clone());
        PathResolver::new(
            store.clone(),
            store.clone(),
            store,
            "node/1",
            vec!["en".to_string(), "nl".to_string()],
        )
    }

    fn resolved(path: &str, lang: &str) -> ResolvedPath {
        ResolvedPath {
            canonical_path: path.to_string(),
            language_prefix: lang.to_string(),
        }
    }

    #[test]
    fn test_front_page_equivalents() {
        let store = SqliteStore::open_in_memory().unwrap();
        let r = resolver(&store);

        assert_eq!(r.resolve("").unwrap(), resolved("node/1", ""));
        assert_eq!(r.resolve("/").unwrap(), resolved("node/1", ""));
        assert_eq!(r.resolve("/nl").unwrap(), resolved("node/1", ""));
        assert_eq!(r.resolve("node/1").unwrap(), resolved("node/1", ""));
    }

    #[test]
    fn test_item_language_becomes_prefix() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.add_item(5, "en").unwrap();
        store.add_item(6, "und").unwrap();
        let r = resolver(&store);

        assert_eq!(r.resolve("/node/5").unwrap(), resolved("node/5", "en"));
        assert_eq!(r.resolve("/en/node/5").unwrap(), resolved("node/5", "en"));
        assert_eq!(r.resolve("node/6").unwrap(), resolved("node/6", ""));
        // Unknown item: no prefix, path untouched
        assert_eq!(r.resolve("node/7/").unwrap(), resolved("node/7", ""));
    }

    #[test]
    fn test_prefixed_alias() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.add_alias("views/archive", "archive", "").unwrap();
        let r = resolver(&store);

        assert_eq!(r.resolve("/nl/archive").unwrap(), resolved("views/archive", "nl"));
        // Prefixed path with unknown alias falls through untouched
        assert_eq!(r.resolve("/nl/unknown").unwrap(), resolved("nl/unknown", ""));
    }

    #[test]
    fn test_bare_alias_of_item() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.add_item(5, "en").unwrap();
        store.add_item(8, "").unwrap();
        store.add_alias("node/5", "about", "en").unwrap();
        store.add_alias("node/8", "contact", "").unwrap();
        let r = resolver(&store);

        assert_eq!(r.resolve("/about").unwrap(), resolved("node/5", "en"));
        assert_eq!(r.resolve("/about/").unwrap(), resolved("node/5", "en"));
        assert_eq!(r.resolve("contact").unwrap(), resolved("node/8", ""));
    }

    #[test]
    fn test_redirect_substitutes_path_and_language() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.add_redirect("old-news", "news", "nl").unwrap();
        store.add_redirect("older-news", "news", "").unwrap();
        let r = resolver(&store);

        assert_eq!(r.resolve("/old-news").unwrap(), resolved("news", "nl"));
        assert_eq!(r.resolve("/older-news").unwrap(), resolved("news", ""));
    }

    #[test]
    fn test_item_prefix_wins_over_alias_stages() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.add_item(5, "en").unwrap();
        // An alias that would otherwise claim the same shape
        store.add_alias("node/9", "node/5", "").unwrap();
        let r = resolver(&store);

        assert_eq!(r.resolve("node/5").unwrap(), resolved("node/5", "en"));
    }
}
