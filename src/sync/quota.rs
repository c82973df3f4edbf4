//! Daily API call budget
//!
//! Tracks non-cached remote calls inside a rolling 24-hour window that
//! starts at the first check after the previous window ran out. The window
//! is persisted as `[window_start, calls_made]` under `dayquota`.

use crate::error::{CounterError, CounterResult};
use crate::store::settings::keys;
use crate::store::SettingsStore;
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Length of one quota window
pub const QUOTA_WINDOW_SECS: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaWindow {
    pub window_start: i64,
    pub calls_made: u64,
}

impl QuotaWindow {
    fn is_expired(&self, now: i64) -> bool {
        now - self.window_start >= QUOTA_WINDOW_SECS
    }
}

pub struct QuotaTracker {
    settings: Arc<dyn SettingsStore>,
    daily_limit: u64,
    /// Serializes read-modify-write of the persisted window
    guard: Mutex<()>,
}

impl QuotaTracker {
    pub fn new(settings: Arc<dyn SettingsStore>, daily_limit: u64) -> Self {
        Self {
            settings,
            daily_limit,
            guard: Mutex::new(()),
        }
    }

    pub fn daily_limit(&self) -> u64 {
        self.daily_limit
    }

    /// Current window, rolled over (and persisted) if 24h have passed
    pub fn window(&self, now: i64) -> CounterResult<QuotaWindow> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| CounterError::LockPoisoned("quota window"))?;
        self.current_window(now)
    }

    /// Current window as a reader would see it, without persisting a rollover
    pub fn snapshot(&self, now: i64) -> CounterResult<QuotaWindow> {
        let window = self.load()?;
        if window.is_expired(now) {
            return Ok(QuotaWindow {
                window_start: now,
                calls_made: 0,
            });
        }
        Ok(window)
    }

    /// Whether one more non-cached call fits in the current window
    pub fn can_fetch(&self, now: i64) -> CounterResult<bool> {
        let window = self.window(now)?;
        Ok(window.calls_made < self.daily_limit)
    }

    /// `Ok(())` if a fetch may proceed, `QuotaExceeded` otherwise
    pub fn ensure_can_fetch(&self, now: i64) -> CounterResult<()> {
        let window = self.window(now)?;
        if window.calls_made < self.daily_limit {
            return Ok(());
        }

        let resets_in_secs = window.window_start + QUOTA_WINDOW_SECS - now;
        log::error!(
            "🚫 Analytics API quota of {} requests reached. Will NOT fetch for the next {}s",
            self.daily_limit,
            resets_in_secs
        );
        Err(CounterError::QuotaExceeded {
            limit: self.daily_limit,
            resets_in_secs,
        })
    }

    /// Count one confirmed non-cached remote call
    ///
    /// Never call this for cache hits.
    pub fn record_call(&self, now: i64) -> CounterResult<QuotaWindow> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| CounterError::LockPoisoned("quota window"))?;

        let mut window = self.current_window(now)?;
        window.calls_made += 1;
        self.save(&window)?;

        log::debug!(
            "📈 Quota: {}/{} calls in current window",
            window.calls_made,
            self.daily_limit
        );
        Ok(window)
    }

    /// Calls left in the window, `None` when the budget is used up
    pub fn remaining(&self, now: i64) -> CounterResult<Option<u64>> {
        let window = self.snapshot(now)?;
        let left = self.daily_limit.saturating_sub(window.calls_made);
        Ok(if left < 1 { None } else { Some(left) })
    }

    /// Seconds until the current window ends
    pub fn resets_in(&self, now: i64) -> CounterResult<i64> {
        let window = self.snapshot(now)?;
        Ok((window.window_start + QUOTA_WINDOW_SECS - now).max(0))
    }

    /// Forget the window entirely (next check starts a fresh one)
    pub fn reset(&self) -> CounterResult<()> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| CounterError::LockPoisoned("quota window"))?;
        self.settings.remove_value(keys::DAY_QUOTA)
    }

    // Caller holds `guard`
    fn current_window(&self, now: i64) -> CounterResult<QuotaWindow> {
        let mut window = self.load()?;
        if window.is_expired(now) {
            window = QuotaWindow {
                window_start: now,
                calls_made: 0,
            };
            self.save(&window)?;
        }
        Ok(window)
    }

    fn load(&self) -> CounterResult<QuotaWindow> {
        let stored = self.settings.get_value(keys::DAY_QUOTA)?;
        let pair = stored.as_ref().and_then(|v| v.as_array());

        let window = match pair {
            Some(values) if values.len() == 2 => QuotaWindow {
                window_start: values[0].as_i64().unwrap_or(0),
                calls_made: values[1].as_u64().unwrap_or(0),
            },
            _ => QuotaWindow {
                window_start: 0,
                calls_made: 0,
            },
        };
        Ok(window)
    }

    fn save(&self, window: &QuotaWindow) -> CounterResult<()> {
        self.settings.set_value(
            keys::DAY_QUOTA,
            json!([window.window_start, window.calls_made]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySettingsStore;

    const NOW: i64 = 1_700_000_000;

    fn tracker(limit: u64) -> (Arc<MemorySettingsStore>, QuotaTracker) {
        let settings = Arc::new(MemorySettingsStore::new());
        let tracker = QuotaTracker::new(settings.clone(), limit);
        (settings, tracker)
    }

    #[test]
    fn test_fresh_window_starts_now() {
        let (_settings, tracker) = tracker(10);
        let window = tracker.window(NOW).unwrap();
        assert_eq!(window.window_start, NOW);
        assert_eq!(window.calls_made, 0);
        assert_eq!(tracker.remaining(NOW).unwrap(), Some(10));
        assert_eq!(tracker.resets_in(NOW).unwrap(), QUOTA_WINDOW_SECS);
    }

    #[test]
    fn test_limit_is_never_exceeded() {
        let (_settings, tracker) = tracker(3);

        let mut made = 0;
        for i in 0..10 {
            if tracker.can_fetch(NOW + i).unwrap() {
                tracker.record_call(NOW + i).unwrap();
                made += 1;
            }
        }

        assert_eq!(made, 3);
        assert_eq!(tracker.remaining(NOW + 10).unwrap(), None);
        assert!(matches!(
            tracker.ensure_can_fetch(NOW + 10),
            Err(CounterError::QuotaExceeded { limit: 3, .. })
        ));
    }

    #[test]
    fn test_window_rolls_over_after_a_day() {
        let (_settings, tracker) = tracker(1);
        tracker.record_call(NOW).unwrap();
        assert!(!tracker.can_fetch(NOW + QUOTA_WINDOW_SECS - 1).unwrap());

        assert!(tracker.can_fetch(NOW + QUOTA_WINDOW_SECS).unwrap());
        let window = tracker.window(NOW + QUOTA_WINDOW_SECS).unwrap();
        assert_eq!(window.window_start, NOW + QUOTA_WINDOW_SECS);
        assert_eq!(window.calls_made, 0);
    }

    #[test]
    fn test_window_is_persisted() {
        let (settings, tracker) = tracker(5);
        tracker.record_call(NOW).unwrap();
        tracker.record_call(NOW + 1).unwrap();

        let reloaded = QuotaTracker::new(settings.clone(), 5);
        assert_eq!(reloaded.window(NOW + 2).unwrap().calls_made, 2);
        assert_eq!(
            settings.get_value(keys::DAY_QUOTA).unwrap(),
            Some(json!([NOW, 2]))
        );

        reloaded.reset().unwrap();
        assert_eq!(reloaded.window(NOW + 3).unwrap().calls_made, 0);
    }

    #[test]
    fn test_snapshot_does_not_write() {
        let (settings, tracker) = tracker(5);

        let fresh = tracker.snapshot(NOW).unwrap();
        assert_eq!(fresh.window_start, NOW);
        assert_eq!(tracker.remaining(NOW).unwrap(), Some(5));
        assert_eq!(tracker.resets_in(NOW).unwrap(), QUOTA_WINDOW_SECS);
        assert_eq!(settings.get_value(keys::DAY_QUOTA).unwrap(), None);

        tracker.record_call(NOW).unwrap();
        let later = NOW + QUOTA_WINDOW_SECS + 5;
        assert_eq!(tracker.snapshot(later).unwrap().calls_made, 0);
        assert_eq!(
            settings.get_value(keys::DAY_QUOTA).unwrap(),
            Some(json!([NOW, 1]))
        );
    }
}
