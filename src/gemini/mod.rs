pub mod client;
pub mod error;
pub mod types;

pub use client::{DEFAULT_MODEL, GeminiClient};
pub use error::GeminiError;
pub use types::{GenerateContentRequest, GenerateContentResponse};

use std::time::Duration;

use crate::error::GenerationFailure;
use crate::media::ImagePayload;
use crate::request::GenerationRequest;

/// The external image-generation capability.
///
/// `Ok(None)` means the call succeeded but produced no image; callers treat
/// it the same as an error.
#[allow(async_fn_in_trait)]
pub trait ImageGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Option<ImagePayload>, GeminiError>;
}

impl<G: ImageGenerator + ?Sized> ImageGenerator for &G {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Option<ImagePayload>, GeminiError> {
        (**self).generate(request).await
    }
}

/// One call to the capability under a time limit. Every way of not getting
/// an image collapses into a [`GenerationFailure`].
pub async fn generate_with_timeout<G: ImageGenerator + ?Sized>(
    generator: &G,
    request: &GenerationRequest<'_>,
    limit: Duration,
) -> Result<ImagePayload, GenerationFailure> {
    match tokio::time::timeout(limit, generator.generate(request)).await {
        Ok(Ok(Some(image))) => Ok(image),
        Ok(Ok(None)) => Err(GenerationFailure::EmptyResult),
        Ok(Err(e)) => Err(GenerationFailure::Api(e)),
        Err(_) => Err(GenerationFailure::TimedOut(limit)),
    }
}
