//! Durable named settings (runtime state)
//!
//! Holds the values that must survive restarts: the two cursors, the quota
//! window, the aggregate counters and cycle timings. Values are stored as
//! JSON documents under a name.

use super::SqliteStore;
use crate::error::{CounterError, CounterResult};
use rusqlite::OptionalExtension;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// Setting names
pub mod keys {
    /// Remote page cursor (`SyncCursor.step`)
    pub const DATA_STEP: &str = "data_step";
    /// Content item cursor (`nodeStep`)
    pub const NODE_DATA_STEP: &str = "node_data_step";
    /// `[window_start, calls_made]`
    pub const DAY_QUOTA: &str = "dayquota";
    /// Remote-reported number of distinct paths
    pub const TOTAL_PATHS: &str = "totalpaths";
    /// Remote-reported pageview total across all paths
    pub const TOTAL_HITS: &str = "totalhits";
    /// Number of known content items at the last mirror cycle
    pub const TOTAL_NODES: &str = "totalnodes";
    pub const SYNC_PROCESS_SECS: &str = "chunk_process_time";
    pub const MIRROR_PROCESS_SECS: &str = "chunk_node_process_time";
    /// Unix time the last cycle started
    pub const LAST_CYCLE_AT: &str = "last_cycle_at";
    /// `{holder, expires_at}` of the process running a cycle
    pub const CYCLE_LEASE: &str = "cycle_lease";

    /// Everything `reset` clears
    pub const RESETTABLE: &[&str] = &[
        DATA_STEP,
        NODE_DATA_STEP,
        DAY_QUOTA,
        TOTAL_PATHS,
        TOTAL_HITS,
        TOTAL_NODES,
        SYNC_PROCESS_SECS,
        MIRROR_PROCESS_SECS,
        LAST_CYCLE_AT,
    ];
}

/// Get/set named values
///
/// Writers serialize their own read-modify-write sequences; the store only
/// guarantees that each individual `set_value` is atomic.
pub trait SettingsStore: Send + Sync {
    fn get_value(&self, name: &str) -> CounterResult<Option<Value>>;

    fn set_value(&self, name: &str, value: Value) -> CounterResult<()>;

    fn remove_value(&self, name: &str) -> CounterResult<()>;

    /// Integer setting, `default` when missing or not an integer
    fn get_i64(&self, name: &str, default: i64) -> CounterResult<i64> {
        Ok(self
            .get_value(name)?
            .and_then(|v| v.as_i64())
            .unwrap_or(default))
    }

    fn set_i64(&self, name: &str, value: i64) -> CounterResult<()> {
        self.set_value(name, Value::from(value))
    }

    /// Take (or renew) the lease `name` for `holder` until `now + ttl_secs`
    ///
    /// Succeeds when the lease is free, expired, or already held by `holder`.
    /// Check and write happen as one atomic step, so two processes sharing
    /// the database never both get `true`.
    fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        now: i64,
        ttl_secs: i64,
    ) -> CounterResult<bool>;

    /// Drop the lease if `holder` still owns it
    fn release_lease(&self, name: &str, holder: &str) -> CounterResult<()>;
}

fn lease_value(holder: &str, expires_at: i64) -> Value {
    json!({ "holder": holder, "expires_at": expires_at })
}

fn lease_is_free(current: Option<&Value>, holder: &str, now: i64) -> bool {
    let Some(current) = current else {
        return true;
    };
    let expired = current
        .get("expires_at")
        .and_then(|v| v.as_i64())
        .map_or(true, |expires_at| expires_at <= now);
    expired || current.get("holder").and_then(|v| v.as_str()) == Some(holder)
}

impl SettingsStore for SqliteStore {
    fn get_value(&self, name: &str) -> CounterResult<Option<Value>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row("SELECT value FROM settings WHERE name = ?", [name], |row| {
                row.get(0)
            })
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn set_value(&self, name: &str, value: Value) -> CounterResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO settings (name, value) VALUES (?1, ?2)
            ON CONFLICT(name) DO UPDATE SET value = excluded.value
            "#,
            rusqlite::params![name, value.to_string()],
        )?;
        Ok(())
    }

    fn remove_value(&self, name: &str) -> CounterResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM settings WHERE name = ?", [name])?;
        Ok(())
    }

    fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        now: i64,
        ttl_secs: i64,
    ) -> CounterResult<bool> {
        let conn = self.lock()?;
        // The upsert's WHERE keeps a live lease of another holder intact
        let changed = conn.execute(
            r#"
            INSERT INTO settings (name, value) VALUES (?1, ?2)
            ON CONFLICT(name) DO UPDATE SET value = excluded.value
            WHERE COALESCE(json_extract(settings.value, '$.expires_at'), 0) <= ?3
               OR json_extract(settings.value, '$.holder') = ?4
            "#,
            rusqlite::params![
                name,
                lease_value(holder, now + ttl_secs).to_string(),
                now,
                holder
            ],
        )?;
        Ok(changed == 1)
    }

    fn release_lease(&self, name: &str, holder: &str) -> CounterResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM settings WHERE name = ?1 AND json_extract(value, '$.holder') = ?2",
            [name, holder],
        )?;
        Ok(())
    }
}

/// Process-local settings, for tests and dry runs
#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get_value(&self, name: &str) -> CounterResult<Option<Value>> {
        let values = self
            .values
            .lock()
            .map_err(|_| CounterError::LockPoisoned("memory settings"))?;
        Ok(values.get(name).cloned())
    }

    fn set_value(&self, name: &str, value: Value) -> CounterResult<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| CounterError::LockPoisoned("memory settings"))?;
        values.insert(name.to_string(), value);
        Ok(())
    }

    fn remove_value(&self, name: &str) -> CounterResult<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| CounterError::LockPoisoned("memory settings"))?;
        values.remove(name);
        Ok(())
    }

    fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        now: i64,
        ttl_secs: i64,
    ) -> CounterResult<bool> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| CounterError::LockPoisoned("memory settings"))?;
        if !lease_is_free(values.get(name), holder, now) {
            return Ok(false);
        }
        values.insert(name.to_string(), lease_value(holder, now + ttl_secs));
        Ok(true)
    }

    fn release_lease(&self, name: &str, holder: &str) -> CounterResult<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| CounterError::LockPoisoned("memory settings"))?;
        let owned = values
            .get(name)
            .and_then(|v| v.get("holder"))
            .and_then(|v| v.as_str())
            == Some(holder);
        if owned {
            values.remove(name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sqlite_settings_roundtrip_and_overwrite() {
        let store = SqliteStore::open_in_memory().unwrap();

        assert!(store.get_value(keys::DAY_QUOTA).unwrap().is_none());
        assert_eq!(store.get_i64(keys::DATA_STEP, 0).unwrap(), 0);

        store.set_value(keys::DAY_QUOTA, json!([1700000000, 4])).unwrap();
        store.set_i64(keys::DATA_STEP, 7).unwrap();
        store.set_i64(keys::DATA_STEP, 8).unwrap();

        assert_eq!(
            store.get_value(keys::DAY_QUOTA).unwrap(),
            Some(json!([1700000000, 4]))
        );
        assert_eq!(store.get_i64(keys::DATA_STEP, 0).unwrap(), 8);

        store.remove_value(keys::DATA_STEP).unwrap();
        assert_eq!(store.get_i64(keys::DATA_STEP, -1).unwrap(), -1);
    }

    fn assert_lease_exclusive(store: &dyn SettingsStore) {
        let now = 1_700_000_000;

        assert!(store.try_acquire_lease(keys::CYCLE_LEASE, "a", now, 60).unwrap());
        assert!(!store.try_acquire_lease(keys::CYCLE_LEASE, "b", now + 1, 60).unwrap());
        // Holder renews its own lease
        assert!(store.try_acquire_lease(keys::CYCLE_LEASE, "a", now + 2, 60).unwrap());

        // Someone else's release is a no-op
        store.release_lease(keys::CYCLE_LEASE, "b").unwrap();
        assert!(!store.try_acquire_lease(keys::CYCLE_LEASE, "b", now + 3, 60).unwrap());

        // Expired lease can be taken over
        assert!(store.try_acquire_lease(keys::CYCLE_LEASE, "b", now + 62, 60).unwrap());
        assert!(!store.try_acquire_lease(keys::CYCLE_LEASE, "a", now + 63, 60).unwrap());

        store.release_lease(keys::CYCLE_LEASE, "b").unwrap();
        assert!(store.get_value(keys::CYCLE_LEASE).unwrap().is_none());
        assert!(store.try_acquire_lease(keys::CYCLE_LEASE, "a", now + 64, 60).unwrap());
    }

    #[test]
    fn test_sqlite_lease_is_exclusive() {
        assert_lease_exclusive(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_memory_lease_is_exclusive() {
        assert_lease_exclusive(&MemorySettingsStore::new());
    }

    #[test]
    fn test_lease_shared_between_connections() {
        let dir = tempfile::TempDir::new().unwrap();
        let db_path = dir.path().join("lease.db").to_string_lossy().to_string();
        let first = SqliteStore::open(&db_path).unwrap();
        let second = SqliteStore::open(&db_path).unwrap();
        let now = 1_700_000_000;

        assert!(first.try_acquire_lease(keys::CYCLE_LEASE, "p1", now, 60).unwrap());
        assert!(!second.try_acquire_lease(keys::CYCLE_LEASE, "p2", now, 60).unwrap());

        first.release_lease(keys::CYCLE_LEASE, "p1").unwrap();
        assert!(second.try_acquire_lease(keys::CYCLE_LEASE, "p2", now, 60).unwrap());
    }

    #[test]
    fn test_non_integer_value_falls_back_to_default() {
        let store = MemorySettingsStore::new();
        store.set_value(keys::TOTAL_HITS, json!("lots")).unwrap();
        assert_eq!(store.get_i64(keys::TOTAL_HITS, 0).unwrap(), 0);
    }
}
