pub mod config;
pub mod next;
pub mod preview;
pub mod render;
pub mod tex;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use invoicer_core::{
    records,
    types::{Selection, Session},
};
use invoicer_pipeline::{paths::assets_dir, PipelineConfig, RenderError, RenderMode};

/// Flags accepted by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Configuration file to use instead of ~/.invoicer/config.yaml.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// LaTeX template to use instead of the built-in one.
    #[arg(long, global = true, value_name = "FILE")]
    pub template: Option<PathBuf>,
}

impl GlobalArgs {
    /// Effective configuration: the chosen file (or defaults) plus flag overrides.
    pub fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load_file(path)
                .with_context(|| format!("failed to load config '{}'", path.display()))?,
            None => PipelineConfig::load().context("failed to load ~/.invoicer/config.yaml")?,
        };
        if config.asset_dir.is_none() {
            config.asset_dir = dirs::home_dir().map(|home| assets_dir(&home));
        }
        if let Some(template) = &self.template {
            config.template = Some(template.clone());
        }
        Ok(config)
    }
}

/// The client/invoice record files a command works on.
#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Client record (JSON).
    #[arg(long, short = 'c', value_name = "FILE")]
    pub client: PathBuf,

    /// Invoice record (JSON).
    #[arg(long, short = 'i', value_name = "FILE")]
    pub invoice: PathBuf,
}

impl RecordArgs {
    pub fn load(&self, session: &mut Session) -> Result<Selection> {
        let client = records::load_client(&self.client)
            .with_context(|| format!("failed to load client '{}'", self.client.display()))?;
        session.remember(&self.client);
        let invoice = records::load_invoice(&self.invoice)
            .with_context(|| format!("failed to load invoice '{}'", self.invoice.display()))?;
        session.remember(&self.invoice);
        Ok(Selection::new(client, invoice))
    }

    /// `<last dir>/<invoice file stem>.<extension>`
    pub fn default_output(&self, session: &Session, extension: &str) -> PathBuf {
        let stem = self
            .invoice
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "invoice".to_string());
        session.start_dir().join(format!("{stem}.{extension}"))
    }
}

/// Where to compile.
#[derive(Args, Debug, Clone)]
pub struct ModeArgs {
    /// Compile on the remote render service.
    #[arg(long, conflicts_with = "local")]
    pub remote: bool,

    /// Compile with the local LaTeX installation.
    #[arg(long)]
    pub local: bool,

    /// Render service address, overriding the configured one.
    #[arg(long, value_name = "HOST:PORT")]
    pub server: Option<String>,
}

impl ModeArgs {
    /// Chosen mode, falling back to `config.default_mode`. Applies `--server`.
    pub fn resolve(&self, config: &mut PipelineConfig) -> RenderMode {
        if let Some(server) = &self.server {
            config.server = server.clone();
        }
        if self.local {
            RenderMode::Local
        } else if self.remote {
            RenderMode::Remote
        } else {
            config.default_mode
        }
    }
}

/// Multi-threaded runtime for the blocking `main`.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")
}

/// Print the compiler transcript, if any, and wrap the error for `main`.
pub fn render_failure(err: RenderError) -> anyhow::Error {
    if let Some(output) = err.compiler_output().filter(|o| !o.trim().is_empty()) {
        eprintln!("{}", "compiler output:".yellow().bold());
        eprintln!("{}", output.trim_end());
    }
    let kind = err.kind();
    anyhow::Error::new(err).context(format!("render failed ({kind} error)"))
}

pub fn print_written(path: &Path, detail: &str) {
    println!("{} Wrote {} {}", "✓".green(), path.display(), detail.bright_black());
}
