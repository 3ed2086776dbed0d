use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::ImagePayload;

/// Stable item identifier: the sheet row the prompt came from.
pub type ItemId = u32;

/// Lifecycle status of a batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Loading,
    Completed,
    Failed,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStatus::Pending => write!(f, "pending"),
            ItemStatus::Loading => write!(f, "loading"),
            ItemStatus::Completed => write!(f, "completed"),
            ItemStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One prompt of a batch and what became of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: ItemId,
    pub prompt: String,
    pub images: Vec<ImagePayload>,
    pub status: ItemStatus,
    pub updated_at: DateTime<Utc>,
}

impl BatchItem {
    pub fn new(id: ItemId, prompt: impl Into<String>) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            images: Vec::new(),
            status: ItemStatus::Pending,
            updated_at: Utc::now(),
        }
    }

    pub fn first_image(&self) -> Option<&ImagePayload> {
        self.images.first()
    }

    /// Completed with at least one image.
    pub fn is_exportable(&self) -> bool {
        self.status == ItemStatus::Completed && !self.images.is_empty()
    }
}

/// A partial update applied atomically to one item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub prompt: Option<String>,
    pub status: Option<ItemStatus>,
    pub images: Option<Vec<ImagePayload>>,
}

impl ItemPatch {
    pub fn status(status: ItemStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_images(mut self, images: Vec<ImagePayload>) -> Self {
        self.images = Some(images);
        self
    }

    /// Applies the patch and returns whether the status changed.
    ///
    /// An item can never end up Completed without an image; such a patch
    /// leaves it Failed instead.
    pub fn apply(self, item: &mut BatchItem) -> bool {
        let before = item.status;
        if let Some(prompt) = self.prompt {
            item.prompt = prompt;
        }
        if let Some(images) = self.images {
            item.images = images;
        }
        if let Some(status) = self.status {
            item.status = status;
        }
        if item.status == ItemStatus::Completed && item.images.is_empty() {
            item.status = ItemStatus::Failed;
        }
        item.updated_at = Utc::now();
        item.status != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_creation_defaults() {
        let item = BatchItem::new(4, "Batman and Superman");
        assert_eq!(item.status, ItemStatus::Pending);
        assert!(item.images.is_empty());
        assert!(!item.is_exportable());
    }

    #[test]
    fn patch_applies_all_fields() {
        let mut item = BatchItem::new(1, "old");
        let image = ImagePayload::new("image/png", b"a".to_vec());
        let changed = ItemPatch::status(ItemStatus::Completed)
            .with_prompt("new")
            .with_images(vec![image.clone()])
            .apply(&mut item);

        assert!(changed);
        assert_eq!(item.prompt, "new");
        assert_eq!(item.first_image(), Some(&image));
        assert!(item.is_exportable());
    }

    #[test]
    fn completed_without_image_becomes_failed() {
        let mut item = BatchItem::new(1, "p");
        ItemPatch::status(ItemStatus::Completed).apply(&mut item);
        assert_eq!(item.status, ItemStatus::Failed);
    }

    #[test]
    fn patch_reports_unchanged_status() {
        let mut item = BatchItem::new(1, "p");
        assert!(!ItemPatch::default().with_prompt("q").apply(&mut item));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ItemStatus::Loading).unwrap(), "\"loading\"");
        assert_eq!(ItemStatus::Completed.to_string(), "completed");
    }
}
