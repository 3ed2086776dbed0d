//! Tipos de dados do endpoint `models/{model}:generateContent` da API Gemini.
//!
//! Os campos seguem o formato JSON em camelCase da API. Imagens trafegam
//! como `inlineData` com o conteúdo em base64.

use serde::{Deserialize, Serialize};

use crate::media::ImagePayload;
use crate::request::GenerationRequest;

/// Corpo da requisição para `generateContent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    /// Monta o corpo a partir de uma requisição validada.
    ///
    /// Ordem das partes: instrução em texto, cena (se houver) e depois as
    /// imagens de referência dos personagens.
    pub fn from_request(request: &GenerationRequest<'_>) -> Self {
        let mut parts = vec![Part::text(request.instruction())];
        if let Some(scene) = request.scene() {
            parts.push(Part::image(scene));
        }
        parts.extend(request.subjects().iter().map(|s| Part::image(&s.image)));

        Self {
            contents: vec![Content {
                role: Some("user".into()),
                parts,
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE".into()],
                image_config: ImageConfig {
                    aspect_ratio: request.aspect_ratio().as_str().to_string(),
                },
            },
        }
    }
}

/// Uma mensagem da conversa: papel e lista de partes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Uma parte de conteúdo: texto ou dados binários embutidos.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn image(image: &ImagePayload) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: image.mime_type.clone(),
                data: image.to_base64(),
            }),
            ..Default::default()
        }
    }
}

/// Dados binários em base64 com o tipo MIME correspondente.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub image_config: ImageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    /// "1:1", "16:9" ou "9:16".
    pub aspect_ratio: String,
}

/// Resposta de `generateContent`. Campos desconhecidos são ignorados.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    /// Motivo da parada (ex.: "STOP", "SAFETY"). `None` se ausente.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Primeira imagem embutida do primeiro candidato que tiver uma.
    pub fn first_image(&self) -> Option<&InlineData> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .find_map(|p| p.inline_data.as_ref())
    }

    /// Motivo de parada do primeiro candidato, para diagnóstico.
    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates.first().and_then(|c| c.finish_reason.as_deref())
    }
}
