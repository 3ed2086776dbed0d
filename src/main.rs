use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cameo::cli::{Cli, Command, InputArgs, KeyAction};
use cameo::config::CameoConfig;
use cameo::credentials::{ApiKey, CredentialStore, FileCredentialStore, resolve_api_key};
use cameo::export::ExportBundler;
use cameo::fanout::{FANOUT_WIDTH, SingleShotFanout};
use cameo::gemini::GeminiClient;
use cameo::jobs::JobStore;
use cameo::media::ImagePayload;
use cameo::orchestrator::BatchOrchestrator;
use cameo::request::{GenerationOptions, GenerationTemplate, ReferenceSubject, SceneReference};
use cameo::sheet::read_prompt_sheet;
use cameo::ui::{BatchProgress, FanoutSpinner};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = CameoConfig::load()?;
    let model = cli.model.clone().unwrap_or_else(|| config.model.clone());

    match cli.command {
        Command::Generate { prompt, inputs, out } => {
            let key = resolve_key(cli.api_key, &config)?;
            generate(&config, &model, key, &prompt, &inputs, &out).await
        }
        Command::Batch {
            sheet,
            inputs,
            out,
            passes,
        } => {
            let key = resolve_key(cli.api_key, &config)?;
            let archive = out.unwrap_or_else(|| PathBuf::from(&config.archive_name));
            batch(&config, &model, key, &sheet, &inputs, &archive, passes).await
        }
        Command::Key { action } => manage_key(action),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "cameo=debug" } else { "cameo=warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// `--api-key`, depois config/`GEMINI_API_KEY`, depois a chave salva.
fn resolve_key(flag: Option<String>, config: &CameoConfig) -> Result<Option<ApiKey>> {
    let saved = match FileCredentialStore::default_location() {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::debug!(error = %e, "no saved-key location");
            None
        }
    };
    let store = saved.as_ref().map(|s| s as &dyn CredentialStore);
    Ok(resolve_api_key([flag, Some(config.api_key.clone())], store)?)
}

/// Lê as imagens de referência e monta as opções de geração.
async fn load_inputs(
    inputs: &InputArgs,
) -> Result<(Vec<ReferenceSubject>, Option<SceneReference>, GenerationOptions)> {
    let mut subjects = Vec::with_capacity(inputs.subjects.len());
    for (index, arg) in inputs.subjects.iter().enumerate() {
        let id = index as u32 + 1;
        let name = arg.name.clone().unwrap_or_else(|| format!("Character {id}"));
        let image = ImagePayload::from_path(&arg.path)
            .await
            .with_context(|| format!("reading subject image {}", arg.path.display()))?;
        let mut subject = ReferenceSubject::new(id, name);
        subject.bind_image(image);
        subjects.push(subject);
    }

    let scene = match &inputs.scene {
        Some(path) if !inputs.no_scene => {
            let image = ImagePayload::from_path(path)
                .await
                .with_context(|| format!("reading scene image {}", path.display()))?;
            Some(SceneReference::new(image))
        }
        _ => None,
    };

    let options = GenerationOptions {
        aspect_ratio: inputs.aspect.into(),
        use_scene: !inputs.no_scene,
        preserve_scene: !inputs.loose_scene,
    };
    Ok((subjects, scene, options))
}

async fn generate(
    config: &CameoConfig,
    model: &str,
    key: Option<ApiKey>,
    prompt: &str,
    inputs: &InputArgs,
    out: &Path,
) -> Result<()> {
    let (subjects, scene, options) = load_inputs(inputs).await?;
    let template = GenerationTemplate::build(&subjects, scene.as_ref(), &options, key.as_ref())?;
    template.request(prompt)?;

    let client = GeminiClient::with_base_url(model, config.base_url.as_str())?;
    let fanout = SingleShotFanout::new(client, config.timeout());

    let spinner = FanoutSpinner::start(prompt, FANOUT_WIDTH);
    let result = fanout.run(&template, prompt).await?;
    spinner.complete(&result);

    if result.succeeded.is_empty() {
        bail!("no image could be generated");
    }

    tokio::fs::create_dir_all(out).await?;
    for (n, image) in result.succeeded.iter().enumerate() {
        let path = out.join(format!("image_{}.{}", n + 1, image.extension()));
        tokio::fs::write(&path, &image.data)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        println!("  {}", path.display());
    }
    Ok(())
}

async fn batch(
    config: &CameoConfig,
    model: &str,
    key: Option<ApiKey>,
    sheet: &Path,
    inputs: &InputArgs,
    archive: &Path,
    passes: u32,
) -> Result<()> {
    let (subjects, scene, options) = load_inputs(inputs).await?;
    let template = GenerationTemplate::build(&subjects, scene.as_ref(), &options, key.as_ref())?;

    let rows = read_prompt_sheet(sheet)
        .await
        .with_context(|| format!("reading prompt sheet {}", sheet.display()))?;
    let store = JobStore::new();
    store.load_rows(rows);
    println!("Loaded {} prompts from {}", store.len(), sheet.display());

    let client = GeminiClient::with_base_url(model, config.base_url.as_str())?;
    let orchestrator = BatchOrchestrator::new(client).with_timeout(config.timeout());

    for pass in 1..=passes {
        let remaining = store.progress().remaining();
        if remaining == 0 {
            break;
        }
        let display = BatchProgress::start(pass, remaining, store.subscribe());
        let summary = orchestrator.run_all(&store, &template).await;
        display.finish(&summary);
    }

    let progress = store.progress();
    if progress.completed == 0 {
        bail!("no item completed; nothing to export");
    }
    let bytes = ExportBundler::build(&store.snapshot())?;
    tokio::fs::write(archive, bytes)
        .await
        .with_context(|| format!("writing {}", archive.display()))?;
    println!(
        "{}/{} images exported to {}",
        progress.completed,
        progress.total,
        archive.display()
    );
    Ok(())
}

fn manage_key(action: KeyAction) -> Result<()> {
    let store = FileCredentialStore::default_location()?;
    match action {
        KeyAction::Set { key } => {
            let key = ApiKey::new(key);
            if key.is_blank() {
                bail!("the API key must not be blank");
            }
            store.set(&key)?;
            println!("API key saved to {}", store.path().display());
        }
        KeyAction::Clear => {
            store.clear()?;
            println!("API key removed");
        }
        KeyAction::Show => match store.get()? {
            Some(key) => println!("{} ({})", key.masked(), store.path().display()),
            None => println!("no API key saved"),
        },
    }
    Ok(())
}
