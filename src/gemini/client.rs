use std::time::Duration;

use reqwest::Client;

use super::ImageGenerator;
use super::error::GeminiError;
use super::types::{GenerateContentRequest, GenerateContentResponse};
use crate::credentials::ApiKey;
use crate::media::ImagePayload;
use crate::request::GenerationRequest;

pub const API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(model: impl Into<String>) -> Result<Self, GeminiError> {
        Self::with_base_url(model, API_URL)
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(model: impl Into<String>, base_url: impl Into<String>) -> Result<Self, GeminiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(180))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    pub async fn generate_content(
        &self,
        api_key: &ApiKey,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key.expose())
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000))
                .unwrap_or(1000);
            return Err(GeminiError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(GeminiError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<GenerateContentResponse>().await?;
        Ok(body)
    }
}

impl ImageGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Option<ImagePayload>, GeminiError> {
        let body = GenerateContentRequest::from_request(request);
        let response = self.generate_content(request.credential(), &body).await?;

        match response.first_image() {
            Some(inline) => Ok(Some(ImagePayload::from_base64(
                inline.mime_type.clone(),
                &inline.data,
            )?)),
            None => {
                tracing::debug!(
                    finish_reason = response.finish_reason().unwrap_or("none"),
                    "response carried no image"
                );
                Ok(None)
            }
        }
    }
}
