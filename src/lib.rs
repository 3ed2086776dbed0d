//! Consistent-character image generation: single-shot fan-out and
//! resumable batch runs over prompt sheets.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod export;
pub mod fanout;
pub mod gemini;
pub mod jobs;
pub mod media;
pub mod orchestrator;
pub mod request;
pub mod sheet;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{GenerationFailure, StudioError, ValidationError};
