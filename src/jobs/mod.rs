mod item;
mod store;

pub use item::{BatchItem, ItemId, ItemPatch, ItemStatus};
pub use store::{EditOutcome, JobStore, StoreProgress};
