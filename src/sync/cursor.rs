//! Resumable chunk cursor
//!
//! Both the remote page sync and the node mirror walk a large result set one
//! chunk per cycle. The cursor remembers which chunk comes next and wraps to
//! zero once the end is reached, so the walk restarts on the following cycle.

use crate::error::CounterResult;
use crate::store::SettingsStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub step: u64,
}

impl Cursor {
    pub fn new(step: u64) -> Self {
        Self { step }
    }

    /// Load from `key`, 0 when unset
    pub fn load(settings: &dyn SettingsStore, key: &str) -> CounterResult<Self> {
        let step = settings.get_i64(key, 0)?;
        Ok(Self::new(step.max(0) as u64))
    }

    pub fn save(&self, settings: &dyn SettingsStore, key: &str) -> CounterResult<()> {
        settings.set_i64(key, self.step as i64)
    }

    /// Zero-based offset of the first row in the current chunk
    pub fn offset(&self, chunk_size: u64) -> u64 {
        self.step * chunk_size
    }

    /// One-based index of the first row, as the reporting API expects
    pub fn start_index(&self, chunk_size: u64) -> u64 {
        self.offset(chunk_size) + 1
    }

    pub fn advance(&mut self) {
        self.step += 1;
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// Move past a chunk whose last row sits at `pointer`
    ///
    /// Advances while `pointer < total`, otherwise wraps to 0.
    pub fn advance_or_wrap(&mut self, pointer: u64, total: u64) {
        if pointer < total {
            self.advance();
        } else {
            self.reset();
        }
    }
}
