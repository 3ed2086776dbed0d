//! Interface de linha de comando do cameo baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (generate, batch, key)
//! e flags globais (--model, --api-key, --verbose).

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::request::AspectRatio;

/// cameo: geração de imagens com personagens consistentes.
#[derive(Debug, Parser)]
#[command(name = "cameo", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Modelo Gemini a usar nesta sessão.
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Chave da API para esta execução (não é salva).
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Gera quatro variações para um único prompt.
    Generate {
        /// Descrição da imagem.
        prompt: String,

        #[command(flatten)]
        inputs: InputArgs,

        /// Diretório onde as imagens serão gravadas.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Gera uma imagem por linha de uma planilha de prompts.
    Batch {
        /// Planilha (.xlsx, .xls, .ods) com colunas STT e Prompt.
        sheet: PathBuf,

        #[command(flatten)]
        inputs: InputArgs,

        /// Arquivo zip de saída. Padrão: `archive_name` da configuração.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Número máximo de passadas; cada passada retenta os itens que falharam.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        passes: u32,
    },

    /// Gerencia a chave da API salva localmente.
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

/// Referências compartilhadas por `generate` e `batch`.
#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Personagem de referência como NOME=CAMINHO (ou só CAMINHO). Repetível.
    #[arg(long = "subject", short = 's', required = true)]
    pub subjects: Vec<SubjectArg>,

    /// Imagem de cenário/fundo.
    #[arg(long)]
    pub scene: Option<PathBuf>,

    /// Ignora a imagem de cenário mesmo que informada.
    #[arg(long, default_value_t = false)]
    pub no_scene: bool,

    /// Usa o cenário apenas como inspiração, sem preservar a composição.
    #[arg(long, default_value_t = false)]
    pub loose_scene: bool,

    /// Proporção da imagem gerada.
    #[arg(long, value_enum, default_value_t = AspectArg::Square)]
    pub aspect: AspectArg,
}

#[derive(Debug, Subcommand)]
pub enum KeyAction {
    /// Salva uma nova chave.
    Set { key: String },
    /// Remove a chave salva.
    Clear,
    /// Mostra se há chave salva (mascarada).
    Show,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AspectArg {
    /// 1:1
    Square,
    /// 16:9
    Wide,
    /// 9:16
    Tall,
}

impl From<AspectArg> for AspectRatio {
    fn from(arg: AspectArg) -> Self {
        match arg {
            AspectArg::Square => AspectRatio::Square,
            AspectArg::Wide => AspectRatio::Wide,
            AspectArg::Tall => AspectRatio::Tall,
        }
    }
}

/// `NOME=CAMINHO` ou apenas `CAMINHO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectArg {
    pub name: Option<String>,
    pub path: PathBuf,
}

impl FromStr for SubjectArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, path) = match s.split_once('=') {
            Some((name, path)) => (Some(name.trim().to_string()), path.trim()),
            None => (None, s.trim()),
        };
        if path.is_empty() {
            return Err(format!("missing image path in `{s}`"));
        }
        Ok(Self {
            name: name.filter(|n| !n.is_empty()),
            path: PathBuf::from(path),
        })
    }
}
