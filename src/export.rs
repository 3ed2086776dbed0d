//! Packaging of completed batch images into one zip archive.

use std::io::{Cursor, Write};

use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::error::{StudioError, ValidationError};
use crate::jobs::BatchItem;
use crate::media::ImagePayload;

/// Number of prompt characters kept in an entry name.
const PREFIX_CHARS: usize = 20;

/// First 20 characters (Unicode scalar values) of the prompt, every
/// character outside `[A-Za-z0-9]` replaced by `_`, lower-cased.
pub fn sanitized_prefix(prompt: &str) -> String {
    prompt
        .chars()
        .take(PREFIX_CHARS)
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// `{id}_{prefix}.{ext}`. The id prefix keeps names unique.
pub fn entry_name(item: &BatchItem, image: &ImagePayload) -> String {
    format!("{}_{}.{}", item.id, sanitized_prefix(&item.prompt), image.extension())
}

/// Writes `(filename, bytes)` pairs into an in-memory zip archive.
pub fn write_archive<'a>(
    entries: impl IntoIterator<Item = (String, &'a [u8])>,
) -> Result<Vec<u8>, StudioError> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        writer.start_file(name, options)?;
        writer.write_all(bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}

pub struct ExportBundler;

impl ExportBundler {
    /// Name and image of every exportable item, in store order.
    pub fn entries(items: &[BatchItem]) -> Vec<(String, &ImagePayload)> {
        items
            .iter()
            .filter(|item| item.is_exportable())
            .filter_map(|item| item.first_image().map(|image| (entry_name(item, image), image)))
            .collect()
    }

    /// Zips the first image of each Completed item.
    pub fn build(items: &[BatchItem]) -> Result<Vec<u8>, StudioError> {
        let entries = Self::entries(items);
        if entries.is_empty() {
            return Err(ValidationError::EmptyExport.into());
        }
        tracing::info!(entries = entries.len(), "building export archive");
        write_archive(
            entries
                .into_iter()
                .map(|(name, image)| (name, image.data.as_slice())),
        )
    }
}
