//! In-process progress channel backed by `tokio::sync::broadcast`.
//!
//! The job store publishes a [`ProgressEvent`] on every status change so a
//! presentation layer can follow a run without polling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::jobs::{ItemId, ItemStatus};

/// One status change of one batch item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub item_id: ItemId,
    pub status: ItemStatus,
    pub at: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(item_id: ItemId, status: ItemStatus) -> Self {
        Self {
            item_id,
            status,
            at: Utc::now(),
        }
    }
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out of progress events to any number of subscribers.
///
/// Slow receivers that fall more than the capacity behind observe
/// `RecvError::Lagged` and should resync from a store snapshot.
#[derive(Debug)]
pub struct ProgressBus {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Events published with no subscriber are dropped.
    pub fn publish(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
