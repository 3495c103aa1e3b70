//! `invoicer preview --client <file> --invoice <file> [--remote|--local]`
//!
//! The PDF is written into a working area owned by the janitor, handed to the
//! viewer, and removed again after the grace delay.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;

use invoicer_core::types::Session;
use invoicer_pipeline::{RenderOrchestrator, RenderOutcome};

use super::{render_failure, runtime, GlobalArgs, ModeArgs, RecordArgs};

/// Compile an invoice and open it in the configured viewer.
#[derive(Args, Debug)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub records: RecordArgs,

    #[command(flatten)]
    pub mode: ModeArgs,
}

impl PreviewArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let mut config = global.load_config()?;
        let mode = self.mode.resolve(&mut config);
        let selection = self.records.load(&mut Session::default())?;
        let orchestrator =
            RenderOrchestrator::new(&config).context("failed to set up the renderer")?;
        let viewer = config.viewer();
        let delay = config.release_delay();

        runtime()?.block_on(async move {
            let janitor = orchestrator.janitor().clone();
            let area = janitor
                .acquire()
                .context("failed to create a preview area")?;
            let destination = area.join("preview.pdf");

            let result = match orchestrator.render(mode, &selection, &destination).await {
                Ok(RenderOutcome::Completed(artifact)) => {
                    open_in_viewer(&viewer, &artifact.path).await
                }
                Ok(RenderOutcome::NothingToRender) => {
                    Err(anyhow!("nothing to render: a record is missing"))
                }
                Err(err) => Err(render_failure(err)),
            };

            janitor.release(area, delay).wait().await;
            result
        })
    }
}

async fn open_in_viewer(viewer: &str, path: &Path) -> Result<()> {
    tracing::info!(viewer, path = %path.display(), "opening preview");
    let status = tokio::process::Command::new(viewer)
        .arg(path)
        .status()
        .await
        .with_context(|| format!("failed to start viewer '{viewer}'"))?;
    if !status.success() {
        bail!("viewer '{viewer}' exited with {status}");
    }
    println!("Opened preview of {}", path.display());
    Ok(())
}
