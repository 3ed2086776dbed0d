//! Prompt sheets: the first worksheet of an `.xlsx`, `.xls` or `.ods` file.
//!
//! Layout is one header row, then one prompt per row with an index in the
//! first column and the prompt text in the second. The sheet row number
//! becomes the item id.

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto_from_rs};

use crate::error::StudioError;
use crate::jobs::ItemId;

/// One usable sheet row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRow {
    /// Zero-based row number in the sheet; the header is row 0.
    pub index: ItemId,
    pub prompt: String,
}

/// Parses spreadsheet bytes. Fails with [`StudioError::NoPrompts`] if no
/// row carries a prompt.
pub fn parse_prompt_sheet(bytes: &[u8]) -> Result<Vec<PromptRow>, StudioError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(StudioError::NoPrompts)??;

    let rows = prompts_from_rows(range.rows());
    if rows.is_empty() {
        return Err(StudioError::NoPrompts);
    }
    tracing::debug!(rows = rows.len(), "prompt sheet parsed");
    Ok(rows)
}

pub async fn read_prompt_sheet(path: &Path) -> Result<Vec<PromptRow>, StudioError> {
    let bytes = tokio::fs::read(path).await?;
    parse_prompt_sheet(&bytes)
}

/// Skips the header row, rows without a second column and rows whose
/// prompt cell is empty.
pub fn prompts_from_rows<'a>(rows: impl Iterator<Item = &'a [Data]>) -> Vec<PromptRow> {
    rows.enumerate()
        .skip(1)
        .filter_map(|(index, row)| {
            let prompt = cell_text(row.get(1)?)?;
            Some(PromptRow {
                index: index as ItemId,
                prompt,
            })
        })
        .collect()
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        other => Some(other.to_string()),
    }
}
