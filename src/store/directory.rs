//! Read-only site directories: content items, URL aliases, redirects
//!
//! These tables belong to the CMS. The counter only queries them; the
//! `add_*` helpers exist for seeding test and staging databases.
//!
//! All paths here are stored without leading or trailing slashes
//! (`node/5`, `about/team`).

use super::SqliteStore;
use crate::error::CounterResult;
use rusqlite::OptionalExtension;

/// A redirect record: requests for `source` are sent to `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub source: String,
    pub target: String,
    /// Language code of the redirect, "" when language-neutral
    pub language: String,
}

/// Alias → canonical path lookups
pub trait AliasDirectory: Send + Sync {
    /// Canonical path for `alias`, `None` on miss
    fn resolve_alias_to_path(&self, alias: &str) -> CounterResult<Option<String>>;

    /// Every alias registered for the canonical `path`
    fn aliases_of(&self, path: &str) -> CounterResult<Vec<String>>;
}

pub trait RedirectDirectory: Send + Sync {
    /// Redirect whose source is `path`, `None` on miss
    fn redirect_for(&self, path: &str) -> CounterResult<Option<Redirect>>;

    /// Every redirect pointing at `target`
    fn redirects_to(&self, target: &str) -> CounterResult<Vec<Redirect>>;
}

pub trait ContentDirectory: Send + Sync {
    fn item_count(&self) -> CounterResult<u64>;

    /// Item ids in ascending order, `limit` of them starting at `offset`
    ///
    /// Ordering is stable across calls so chunked cursors never skip items.
    fn item_ids(&self, offset: u64, limit: u64) -> CounterResult<Vec<i64>>;

    /// Language code of the item: `None` if the item does not exist,
    /// `Some("")` if it has no language
    fn language_of(&self, item_id: i64) -> CounterResult<Option<String>>;
}

impl AliasDirectory for SqliteStore {
    fn resolve_alias_to_path(&self, alias: &str) -> CounterResult<Option<String>> {
        let conn = self.lock()?;
        let source = conn
            .query_row(
                "SELECT source FROM url_aliases WHERE alias = ? ORDER BY id ASC LIMIT 1",
                [alias],
                |row| row.get(0),
            )
            .optional()?;
        Ok(source)
    }

    fn aliases_of(&self, path: &str) -> CounterResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT alias FROM url_aliases WHERE source = ? ORDER BY id ASC")?;
        let aliases = stmt
            .query_map([path], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(aliases)
    }
}

impl RedirectDirectory for SqliteStore {
    fn redirect_for(&self, path: &str) -> CounterResult<Option<Redirect>> {
        let conn = self.lock()?;
        let redirect = conn
            .query_row(
                "SELECT source, target, langcode FROM redirects
                 WHERE source = ? ORDER BY id ASC LIMIT 1",
                [path],
                |row| {
                    Ok(Redirect {
                        source: row.get(0)?,
                        target: row.get(1)?,
                        language: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(redirect)
    }

    fn redirects_to(&self, target: &str) -> CounterResult<Vec<Redirect>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT source, target, langcode FROM redirects WHERE target = ? ORDER BY id ASC",
        )?;
        let redirects = stmt
            .query_map([target], |row| {
                Ok(Redirect {
                    source: row.get(0)?,
                    target: row.get(1)?,
                    language: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(redirects)
    }
}

impl ContentDirectory for SqliteStore {
    fn item_count(&self) -> CounterResult<u64> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM content_items", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn item_ids(&self, offset: u64, limit: u64) -> CounterResult<Vec<i64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT item_id FROM content_items ORDER BY item_id ASC LIMIT ?1 OFFSET ?2",
        )?;
        let ids = stmt
            .query_map(rusqlite::params![limit as i64, offset as i64], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    fn language_of(&self, item_id: i64) -> CounterResult<Option<String>> {
        let conn = self.lock()?;
        let langcode = conn
            .query_row(
                "SELECT langcode FROM content_items WHERE item_id = ?",
                [item_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(langcode)
    }
}

impl SqliteStore {
    pub fn add_item(&self, item_id: i64, langcode: &str) -> CounterResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO content_items (item_id, langcode) VALUES (?1, ?2)",
            rusqlite::params![item_id, langcode],
        )?;
        Ok(())
    }

    pub fn add_alias(&self, source: &str, alias: &str, langcode: &str) -> CounterResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO url_aliases (source, alias, langcode) VALUES (?1, ?2, ?3)",
            rusqlite::params![source, alias, langcode],
        )?;
        Ok(())
    }

    pub fn add_redirect(&self, source: &str, target: &str, langcode: &str) -> CounterResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO redirects (source, target, langcode) VALUES (?1, ?2, ?3)",
            rusqlite::params![source, target, langcode],
        )?;
        Ok(())
    }
}
