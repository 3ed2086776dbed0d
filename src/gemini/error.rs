//! Tipos de erro para o cliente da API Gemini.
//!
//! Define [`GeminiError`] com variantes para rate limiting, erros da API,
//! erros de rede e falhas ao decodificar a imagem retornada.

use thiserror::Error;

/// Erros que podem ocorrer ao chamar o endpoint `generateContent`.
///
/// - [`RateLimited`](GeminiError::RateLimited): o servidor retornou HTTP 429
/// - [`ApiError`](GeminiError::ApiError): qualquer outro erro HTTP (4xx/5xx)
/// - [`NetworkError`](GeminiError::NetworkError): falha na camada de rede
/// - [`Decode`](GeminiError::Decode): a imagem em base64 veio corrompida
#[derive(Debug, Error)]
pub enum GeminiError {
    /// O servidor retornou HTTP 429.
    /// `retry_after_ms` indica quantos milissegundos esperar antes de tentar de novo.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Erro retornado pela API (ex.: 400 chave inválida, 500 erro interno).
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout do reqwest).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Os dados `inlineData` não eram base64 válido.
    #[error("invalid image data: {0}")]
    Decode(#[from] base64::DecodeError),
}
