//! Configuração do cameo carregada a partir de `cameo.toml`.
//!
//! A struct [`CameoConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `GEMINI_API_KEY` tem precedência sobre o arquivo.

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::gemini::DEFAULT_MODEL;
use crate::gemini::client::API_URL;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "cameo.toml";

/// Configuração de nível superior carregada de `cameo.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct CameoConfig {
    /// Chave da API Gemini.
    #[serde(default)]
    pub api_key: String,

    /// Modelo de geração de imagens.
    #[serde(default = "default_model")]
    pub model: String,

    /// URL base da API (útil para apontar para um proxy).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Tempo máximo, em segundos, de uma chamada de geração.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Nome padrão do arquivo zip exportado no modo em lote.
    #[serde(default = "default_archive_name")]
    pub archive_name: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    API_URL.to_string()
}

// Valor padrão para o timeout: 120s.
fn default_timeout_secs() -> u64 {
    120
}

fn default_archive_name() -> String {
    "all_images.zip".to_string()
}

impl Default for CameoConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            archive_name: default_archive_name(),
        }
    }
}

impl CameoConfig {
    /// Carrega a configuração de `cameo.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Igual a [`load`](Self::load), mas com caminho explícito.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<CameoConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo para a chave API.
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                config.api_key = key;
            }
        }

        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}
