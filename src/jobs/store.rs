use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use super::item::{BatchItem, ItemId, ItemPatch, ItemStatus};
use crate::error::GenerationFailure;
use crate::events::{ProgressBus, ProgressEvent};
use crate::media::ImagePayload;
use crate::sheet::PromptRow;

/// Result of a user edit of an item's prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Prompt replaced and status reset to Pending.
    Applied,
    /// The item is being generated right now; nothing changed.
    Busy,
    Missing,
}

/// Status counts for a progress line such as "12/40 completed".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreProgress {
    pub total: usize,
    pub pending: usize,
    pub loading: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StoreProgress {
    /// Items a further pass would try again.
    pub fn remaining(&self) -> usize {
        self.total - self.completed
    }
}

#[derive(Debug, Default)]
struct StoreState {
    order: Vec<ItemId>,
    items: HashMap<ItemId, BatchItem>,
    /// Bumped by every `load`. Ids are reused across sheets, so an attempt
    /// only writes back if the epoch it started in is still current.
    epoch: u64,
}

/// Ordered, id-indexed collection of batch items.
///
/// Item data lives behind a lock that is never held across an `.await`, so
/// readers always see a consistent copy. Generation attempts on one id are
/// serialized through a per-id async gate (see [`JobStore::gate`]).
#[derive(Debug, Default)]
pub struct JobStore {
    state: RwLock<StoreState>,
    gates: Mutex<HashMap<ItemId, Arc<tokio::sync::Mutex<()>>>>,
    events: ProgressBus,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole collection. Items found Loading are reset to
    /// Pending since nothing can be in flight for a freshly loaded item.
    /// Attempts still running against the previous collection are discarded
    /// when they finish.
    pub fn load(&self, items: Vec<BatchItem>) {
        let mut order = Vec::with_capacity(items.len());
        let mut map = HashMap::with_capacity(items.len());
        for mut item in items {
            if map.contains_key(&item.id) {
                tracing::warn!(item_id = item.id, "duplicate item id ignored on load");
                continue;
            }
            if item.status == ItemStatus::Loading {
                item.status = ItemStatus::Pending;
            }
            order.push(item.id);
            map.insert(item.id, item);
        }

        let mut state = self.state.write();
        state.order = order;
        state.items = map;
        state.epoch += 1;
        self.gates.lock().clear();
        tracing::debug!(items = state.order.len(), epoch = state.epoch, "job store loaded");
    }

    /// Seeds the store from parsed sheet rows.
    pub fn load_rows(&self, rows: Vec<PromptRow>) {
        self.load(
            rows.into_iter()
                .map(|row| BatchItem::new(row.index, row.prompt))
                .collect(),
        );
    }

    pub fn get(&self, id: ItemId) -> Option<BatchItem> {
        self.state.read().items.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids in load order.
    pub fn ids(&self) -> Vec<ItemId> {
        self.state.read().order.clone()
    }

    /// Applies `patch` atomically. Returns `false` if `id` is unknown.
    pub fn update(&self, id: ItemId, patch: ItemPatch) -> bool {
        let mut state = self.state.write();
        let Some(item) = state.items.get_mut(&id) else {
            return false;
        };
        if patch.apply(item) {
            self.events.publish(ProgressEvent::new(id, item.status));
        }
        true
    }

    /// User edit of a prompt. Resets the item to Pending but keeps its last
    /// images until the next attempt resolves.
    pub fn edit_prompt(&self, id: ItemId, prompt: impl Into<String>) -> EditOutcome {
        let mut state = self.state.write();
        let Some(item) = state.items.get_mut(&id) else {
            return EditOutcome::Missing;
        };
        if item.status == ItemStatus::Loading {
            return EditOutcome::Busy;
        }
        let changed = ItemPatch::status(ItemStatus::Pending)
            .with_prompt(prompt)
            .apply(item);
        if changed {
            self.events.publish(ProgressEvent::new(id, item.status));
        }
        EditOutcome::Applied
    }

    /// Point-in-time copy in load order.
    pub fn snapshot(&self) -> Vec<BatchItem> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.items.get(id).cloned())
            .collect()
    }

    pub fn progress(&self) -> StoreProgress {
        let state = self.state.read();
        let mut progress = StoreProgress {
            total: state.order.len(),
            ..Default::default()
        };
        for item in state.items.values() {
            match item.status {
                ItemStatus::Pending => progress.pending += 1,
                ItemStatus::Loading => progress.loading += 1,
                ItemStatus::Completed => progress.completed += 1,
                ItemStatus::Failed => progress.failed += 1,
            }
        }
        progress
    }

    /// Receives every status change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// The async gate serializing generation attempts on `id`. Holders keep
    /// it for the whole attempt, from Loading to the final write.
    pub(crate) fn gate(&self, id: ItemId) -> Arc<tokio::sync::Mutex<()>> {
        self.gates.lock().entry(id).or_default().clone()
    }

    /// Current load epoch.
    pub(crate) fn epoch(&self) -> u64 {
        self.state.read().epoch
    }

    /// Marks `id` Loading and returns the prompt to generate from together
    /// with the epoch the attempt belongs to. With `expected` set, nothing
    /// happens unless the store is still in that epoch.
    pub(crate) fn begin_attempt(&self, id: ItemId, expected: Option<u64>) -> Option<(String, u64)> {
        let mut state = self.state.write();
        let epoch = state.epoch;
        if expected.is_some_and(|e| e != epoch) {
            return None;
        }
        let item = state.items.get_mut(&id)?;
        if ItemPatch::status(ItemStatus::Loading).apply(item) {
            self.events.publish(ProgressEvent::new(id, item.status));
        }
        Some((item.prompt.clone(), epoch))
    }

    /// Writes the outcome of an attempt: status and images change together.
    /// Returns `None` without writing if the store was reloaded since the
    /// attempt began.
    pub(crate) fn finish_attempt(
        &self,
        id: ItemId,
        epoch: u64,
        outcome: Result<ImagePayload, &GenerationFailure>,
    ) -> Option<ItemStatus> {
        let patch = match outcome {
            Ok(image) => ItemPatch::status(ItemStatus::Completed).with_images(vec![image]),
            Err(_) => ItemPatch::status(ItemStatus::Failed).with_images(Vec::new()),
        };
        let mut state = self.state.write();
        if state.epoch != epoch {
            tracing::debug!(item_id = id, "store reloaded during attempt, result discarded");
            return None;
        }
        let item = state.items.get_mut(&id)?;
        if patch.apply(item) {
            self.events.publish(ProgressEvent::new(id, item.status));
        }
        Some(item.status)
    }
}
