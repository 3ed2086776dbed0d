use std::time::Duration;

use thiserror::Error;

use crate::gemini::GeminiError;

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Spreadsheet error: {0}")]
    Sheet(#[from] calamine::Error),

    #[error("No valid prompts found. The sheet needs an index column and a prompt column.")]
    NoPrompts,

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A precondition that was not met. Always raised before any network call,
/// and always recoverable by correcting the input and retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no API key configured. Run `cameo key set <KEY>` or set GEMINI_API_KEY")]
    MissingCredential,

    #[error("scene usage is enabled but no scene image is bound")]
    MissingScene,

    #[error("select at least one subject that has an image bound")]
    NoSubjectsSelected,

    #[error("prompt must not be empty")]
    EmptyPrompt,

    #[error("there are no completed images to export")]
    EmptyExport,
}

/// Why one call to the generation capability did not produce an image.
///
/// Never fatal: batch mode records it as a Failed item, single-shot mode as
/// a missing slot in the gallery.
#[derive(Debug, Error)]
pub enum GenerationFailure {
    #[error("generation call failed: {0}")]
    Api(#[from] GeminiError),

    #[error("generation returned no image")]
    EmptyResult,

    #[error("generation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("request rejected: {0}")]
    Invalid(#[from] ValidationError),
}
