//! Armazenamento da chave de API do Gemini.
//!
//! O trait [`CredentialStore`] expõe `get`/`set`/`clear`. Há uma implementação
//! em memória (útil em testes) e outra baseada em arquivo, que guarda a chave
//! no diretório de configuração do usuário.

use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::StudioError;

/// Chave de API repassada ao serviço de geração. O `Debug` nunca mostra o valor.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }

    /// Primeiros quatro caracteres seguidos de `…`, para exibição.
    pub fn masked(&self) -> String {
        let head: String = self.0.chars().take(4).collect();
        format!("{head}…")
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Origem da chave de API usada pelo orquestrador.
pub trait CredentialStore {
    /// Retorna a chave salva, se houver.
    fn get(&self) -> Result<Option<ApiKey>, StudioError>;
    /// Substitui a chave salva.
    fn set(&self, key: &ApiKey) -> Result<(), StudioError>;
    /// Remove a chave salva. Não falha se não houver chave.
    fn clear(&self) -> Result<(), StudioError>;
}

/// Primeira chave não vazia entre `explicit` (na ordem dada); senão a do
/// armazenamento, se houver um. Sem nenhuma, `Ok(None)`.
pub fn resolve_api_key(
    explicit: impl IntoIterator<Item = Option<String>>,
    store: Option<&dyn CredentialStore>,
) -> Result<Option<ApiKey>, StudioError> {
    if let Some(key) = explicit.into_iter().flatten().map(ApiKey::new).find(|k| !k.is_blank()) {
        return Ok(Some(key));
    }
    match store {
        Some(store) => store.get(),
        None => Ok(None),
    }
}

/// Chave mantida apenas em memória durante a execução do processo.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    key: RwLock<Option<ApiKey>>,
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Result<Option<ApiKey>, StudioError> {
        Ok(self.key.read().clone())
    }

    fn set(&self, key: &ApiKey) -> Result<(), StudioError> {
        *self.key.write() = Some(key.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StudioError> {
        *self.key.write() = None;
        Ok(())
    }
}

/// Chave persistida em um arquivo de texto simples.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Local padrão: `<config dir>/cameo/api_key`.
    pub fn default_location() -> Result<Self, StudioError> {
        let base = dirs::config_dir()
            .ok_or_else(|| StudioError::Config("could not determine the user config directory".into()))?;
        Ok(Self::new(base.join("cameo").join("api_key")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Result<Option<ApiKey>, StudioError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let key = ApiKey::new(contents);
                Ok((!key.is_blank()).then_some(key))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &ApiKey) -> Result<(), StudioError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, key.expose())?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StudioError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
