//! Interface de terminal do cameo: spinners, barra de progresso e saída colorida.
//!
//! Usa `indicatif` para spinners/barras e `console` para cores. A barra do
//! modo em lote é alimentada pelo canal de progresso do [`JobStore`](crate::jobs::JobStore),
//! sem consultar o estado diretamente.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::events::ProgressEvent;
use crate::fanout::FanoutResult;
use crate::jobs::ItemStatus;
use crate::orchestrator::BatchSummary;

/// Estilos compartilhados.
struct Palette {
    green: Style,
    red: Style,
    yellow: Style,
}

impl Palette {
    fn new() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }
}

/// Spinner exibido enquanto as quatro variações do modo único são geradas.
pub struct FanoutSpinner {
    pb: ProgressBar,
    palette: Palette,
}

impl FanoutSpinner {
    pub fn start(prompt: &str, width: usize) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("Generating {width} variations: {prompt}"));
        pb.enable_steady_tick(Duration::from_millis(100));
        Self {
            pb,
            palette: Palette::new(),
        }
    }

    /// Finaliza o spinner. Falha parcial vira aviso amarelo, não erro.
    pub fn complete(&self, result: &FanoutResult) {
        self.pb.finish_and_clear();
        let got = result.succeeded.len();
        if got == 0 {
            println!("  {} No image could be generated", self.palette.red.apply_to("✗"));
        } else if result.is_partial() {
            println!(
                "  {} Only {got}/{} images were generated. Try again for more.",
                self.palette.yellow.apply_to("!"),
                result.attempted
            );
        } else {
            println!("  {} {got} images generated", self.palette.green.apply_to("✓"));
        }
    }
}

/// Barra de progresso de uma passada em lote.
pub struct BatchProgress {
    pb: ProgressBar,
    listener: Option<JoinHandle<()>>,
}

impl BatchProgress {
    /// Inicia a barra para `queued` itens e passa a ouvir os eventos.
    pub fn start(pass: u32, queued: usize, events: broadcast::Receiver<ProgressEvent>) -> Self {
        let pb = ProgressBar::new(queued as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{prefix} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .expect("invalid template")
                .progress_chars("=> "),
        );
        pb.set_prefix(format!("pass {pass}"));
        pb.enable_steady_tick(Duration::from_millis(100));

        let listener = tokio::spawn(listen(pb.clone(), events));
        Self {
            pb,
            listener: Some(listener),
        }
    }

    /// Encerra a barra e imprime o resumo da passada.
    pub fn finish(mut self, summary: &BatchSummary) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.pb.finish_and_clear();

        let palette = Palette::new();
        let failed = if summary.failed > 0 {
            palette.red.apply_to(format!("{} failed", summary.failed))
        } else {
            palette.green.apply_to("0 failed".to_string())
        };
        println!(
            "  {} {}/{} completed, {failed}, {} already done ({} ms)",
            palette.green.apply_to("✓"),
            summary.completed + summary.skipped,
            summary.total,
            summary.skipped,
            summary.duration_ms()
        );
    }
}

impl Drop for BatchProgress {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

async fn listen(pb: ProgressBar, mut events: broadcast::Receiver<ProgressEvent>) {
    let palette = Palette::new();
    loop {
        match events.recv().await {
            Ok(event) => match event.status {
                ItemStatus::Loading => pb.set_message(format!("item {}", event.item_id)),
                ItemStatus::Completed => pb.inc(1),
                ItemStatus::Failed => {
                    pb.println(format!(
                        "  {} item {} failed",
                        palette.red.apply_to("✗"),
                        event.item_id
                    ));
                    pb.inc(1);
                }
                ItemStatus::Pending => {}
            },
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::debug!(missed, "progress display lagged behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
