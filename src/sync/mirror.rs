//! Node counter mirror
//!
//! Walks the known content items one chunk per cycle and writes each item's
//! aggregated pageview sum into `node_counts`. The item is counted by its
//! identifier path (`node/<id>`), so aliases, language variants and
//! redirect sources all land on the same row.
//!
//! Zero sums are never written: a missing row means "no recorded views".

use super::cursor::Cursor;
use crate::counter::PageviewCounter;
use crate::error::CounterResult;
use crate::resolve::matchers::item_path;
use crate::resolve::CacheMode;
use crate::store::settings::keys;
use crate::store::{ContentDirectory, NodeCountStore, SettingsStore};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorOutcome {
    pub items_processed: usize,
    /// Items with a non-zero sum (upserted)
    pub items_written: usize,
    pub next_step: u64,
    pub elapsed_secs: u64,
}

pub struct NodeCounterMirror {
    counter: Arc<PageviewCounter>,
    content: Arc<dyn ContentDirectory>,
    node_counts: Arc<dyn NodeCountStore>,
    settings: Arc<dyn SettingsStore>,
    chunk_size: u64,
}

impl NodeCounterMirror {
    pub fn new(
        counter: Arc<PageviewCounter>,
        content: Arc<dyn ContentDirectory>,
        node_counts: Arc<dyn NodeCountStore>,
        settings: Arc<dyn SettingsStore>,
        chunk_size: u64,
    ) -> Self {
        Self {
            counter,
            content,
            node_counts,
            settings,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn mirror_next_chunk(&self, now: i64) -> CounterResult<MirrorOutcome> {
        let cycle_start = Instant::now();

        let mut cursor = Cursor::load(self.settings.as_ref(), keys::NODE_DATA_STEP)?;
        let offset = cursor.offset(self.chunk_size);
        let total_items = self.content.item_count()?;
        let item_ids = self.content.item_ids(offset, self.chunk_size)?;

        let mut items_written = 0;
        for item_id in &item_ids {
            // Recompute rather than trust a sum cached before this cycle's merge
            let total = self
                .counter
                .count_with(&item_path(*item_id), CacheMode::Refresh, now)?;
            if total == 0 {
                continue;
            }
            self.node_counts.upsert_node_count(*item_id, total, now)?;
            items_written += 1;
        }

        let pointer = offset + self.chunk_size;
        cursor.advance_or_wrap(pointer, total_items);
        cursor.save(self.settings.as_ref(), keys::NODE_DATA_STEP)?;

        let elapsed_secs = cycle_start.elapsed().as_secs();
        self.settings.set_i64(keys::TOTAL_NODES, total_items as i64)?;
        self.settings
            .set_i64(keys::MIRROR_PROCESS_SECS, elapsed_secs as i64)?;

        log::info!(
            "🗂️  Mirrored {} items ({} with views), offset {}",
            item_ids.len(),
            items_written,
            offset
        );
        log::info!(
            "   └─ Total items: {}, next step: {}",
            total_items,
            cursor.step
        );

        Ok(MirrorOutcome {
            items_processed: item_ids.len(),
            items_written,
            next_step: cursor.step,
            elapsed_secs,
        })
    }
}
