//! `invoicer render --client <file> --invoice <file> [--output <file>] [--remote|--local]`

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use invoicer_core::types::Session;
use invoicer_pipeline::{RenderOrchestrator, RenderOutcome};

use super::{print_written, render_failure, runtime, GlobalArgs, ModeArgs, RecordArgs};

/// Compile an invoice to PDF.
#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub records: RecordArgs,

    /// Destination PDF. Defaults to the invoice file name with `.pdf`,
    /// next to the invoice.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub mode: ModeArgs,
}

impl RenderArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let mut config = global.load_config()?;
        let mode = self.mode.resolve(&mut config);
        let mut session = Session::default();
        let selection = self.records.load(&mut session)?;
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| self.records.default_output(&session, "pdf"));

        let orchestrator =
            RenderOrchestrator::new(&config).context("failed to set up the renderer")?;
        let outcome = runtime()?
            .block_on(async move { orchestrator.spawn(mode, selection, output).await })
            .map_err(render_failure)?;

        match outcome {
            RenderOutcome::Completed(artifact) => {
                print_written(
                    &artifact.path,
                    &format!("({} bytes, {mode} render)", artifact.len()),
                );
                Ok(())
            }
            RenderOutcome::NothingToRender => bail!("nothing to render: a record is missing"),
        }
    }
}
