//! Pageview and node-count tables
//!
//! `pageviews` is written only by the sync engine and never pruned.
//! `node_counts` is written only by the node counter mirror.

use super::SqliteStore;
use crate::error::CounterResult;
use crate::hashing::path_hash;
use rusqlite::OptionalExtension;

/// One mirrored remote row
///
/// `path_hash` is always `path_hash(path)`; construct through `new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageviewRecord {
    pub path_hash: String,
    pub path: String,
    pub pageviews: i64,
}

impl PageviewRecord {
    pub fn new(path: impl Into<String>, pageviews: i64) -> Self {
        let path = path.into();
        Self {
            path_hash: path_hash(&path),
            path,
            pageviews,
        }
    }
}

/// Mirrored pageview rows keyed by path hash
pub trait PageviewStore: Send + Sync {
    /// Upsert every record (last write wins on `pageviews`)
    ///
    /// The whole batch commits atomically; replaying the same batch leaves
    /// the table unchanged.
    fn merge_records(&self, records: &[PageviewRecord]) -> CounterResult<usize>;

    /// Sum of `pageviews` over rows whose hash is in `hashes`
    fn sum_for_hashes(&self, hashes: &[String]) -> CounterResult<i64>;

    fn record_for_path(&self, path: &str) -> CounterResult<Option<PageviewRecord>>;
}

/// Per-item totals
pub trait NodeCountStore: Send + Sync {
    fn upsert_node_count(&self, item_id: i64, total_pageviews: i64, now: i64) -> CounterResult<()>;

    /// `None` means the item was never observed with views
    fn node_count(&self, item_id: i64) -> CounterResult<Option<i64>>;
}

impl PageviewStore for SqliteStore {
    fn merge_records(&self, records: &[PageviewRecord]) -> CounterResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO pageviews (path_hash, path, pageviews)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(path_hash) DO UPDATE SET
                    path = excluded.path,
                    pageviews = excluded.pageviews
                "#,
            )?;
            for record in records {
                stmt.execute(rusqlite::params![
                    record.path_hash,
                    record.path,
                    record.pageviews
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    fn sum_for_hashes(&self, hashes: &[String]) -> CounterResult<i64> {
        if hashes.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; hashes.len()].join(", ");
        let sql = format!(
            "SELECT COALESCE(SUM(pageviews), 0) FROM pageviews WHERE path_hash IN ({})",
            placeholders
        );

        let conn = self.lock()?;
        let sum = conn.query_row(&sql, rusqlite::params_from_iter(hashes.iter()), |row| {
            row.get(0)
        })?;
        Ok(sum)
    }

    fn record_for_path(&self, path: &str) -> CounterResult<Option<PageviewRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT path_hash, path, pageviews FROM pageviews WHERE path_hash = ?",
                [path_hash(path)],
                |row| {
                    Ok(PageviewRecord {
                        path_hash: row.get(0)?,
                        path: row.get(1)?,
                        pageviews: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}

impl NodeCountStore for SqliteStore {
    fn upsert_node_count(&self, item_id: i64, total_pageviews: i64, now: i64) -> CounterResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO node_counts (item_id, total_pageviews, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(item_id) DO UPDATE SET
                total_pageviews = excluded.total_pageviews,
                updated_at = excluded.updated_at
            "#,
            rusqlite::params![item_id, total_pageviews, now],
        )?;
        Ok(())
    }

    fn node_count(&self, item_id: i64) -> CounterResult<Option<i64>> {
        let conn = self.lock()?;
        let total = conn
            .query_row(
                "SELECT total_pageviews FROM node_counts WHERE item_id = ?",
                [item_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(total)
    }
}
