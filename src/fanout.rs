//! Single-shot mode: one prompt, four concurrent generations.
//!
//! All branches run to completion; a failing branch never cancels its
//! siblings. Results are returned in arrival order.

use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;

use crate::error::ValidationError;
use crate::gemini::{ImageGenerator, generate_with_timeout};
use crate::media::ImagePayload;
use crate::request::GenerationTemplate;

/// Number of concurrent calls per single-shot run.
pub const FANOUT_WIDTH: usize = 4;

/// Outcome of one fan-out round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanoutResult {
    /// Successful images in arrival order.
    pub succeeded: Vec<ImagePayload>,
    pub attempted: usize,
}

impl FanoutResult {
    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded.len()
    }

    /// Some branches failed. Callers should warn but still show what succeeded.
    pub fn is_partial(&self) -> bool {
        self.succeeded.len() < self.attempted
    }
}

pub struct SingleShotFanout<G> {
    generator: G,
    timeout: Duration,
}

impl<G: ImageGenerator> SingleShotFanout<G> {
    pub fn new(generator: G, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Sends the same request [`FANOUT_WIDTH`] times and waits for every
    /// branch to settle. Only an invalid prompt is an error; generation
    /// failures just shrink `succeeded`.
    pub async fn run(
        &self,
        template: &GenerationTemplate,
        prompt: &str,
    ) -> Result<FanoutResult, ValidationError> {
        let request = template.request(prompt)?;
        let request = &request;
        let generator = &self.generator;
        let timeout = self.timeout;

        let mut branches: FuturesUnordered<_> = (0..FANOUT_WIDTH)
            .map(|branch| async move {
                (branch, generate_with_timeout(generator, request, timeout).await)
            })
            .collect();

        let mut result = FanoutResult {
            succeeded: Vec::with_capacity(FANOUT_WIDTH),
            attempted: FANOUT_WIDTH,
        };
        while let Some((branch, outcome)) = branches.next().await {
            match outcome {
                Ok(image) => result.succeeded.push(image),
                Err(e) => tracing::warn!(branch, error = %e, "fan-out branch failed"),
            }
        }

        tracing::info!(
            succeeded = result.succeeded.len(),
            attempted = result.attempted,
            "fan-out finished"
        );
        Ok(result)
    }
}
