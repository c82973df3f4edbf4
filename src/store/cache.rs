//! Generic expiring key/value cache
//!
//! Used for remote response pages and aggregated path sums. There is no
//! active invalidation: entries live until `expires_at`, and concurrent
//! writers simply overwrite each other (entries are recomputable).

use super::SqliteStore;
use crate::error::CounterResult;
use rusqlite::OptionalExtension;
use serde_json::Value;

pub trait ExpiringCache: Send + Sync {
    /// Stored value if present and `now < expires_at`
    fn get(&self, cid: &str, now: i64) -> CounterResult<Option<Value>>;

    fn set(&self, cid: &str, value: &Value, expires_at: i64) -> CounterResult<()>;

    /// Drop expired entries, returning how many were removed
    fn purge_expired(&self, now: i64) -> CounterResult<usize>;
}

impl ExpiringCache for SqliteStore {
    fn get(&self, cid: &str, now: i64) -> CounterResult<Option<Value>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT data FROM cache_entries WHERE cid = ?1 AND expires_at > ?2",
                rusqlite::params![cid, now],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn set(&self, cid: &str, value: &Value, expires_at: i64) -> CounterResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO cache_entries (cid, data, expires_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(cid) DO UPDATE SET
                data = excluded.data,
                expires_at = excluded.expires_at
            "#,
            rusqlite::params![cid, value.to_string(), expires_at],
        )?;
        Ok(())
    }

    fn purge_expired(&self, now: i64) -> CounterResult<usize> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM cache_entries WHERE expires_at <= ?", [now])?;
        Ok(removed)
    }
}
