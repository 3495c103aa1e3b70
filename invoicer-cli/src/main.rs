//! Invoicer: render client/invoice records into PDF invoices.
//!
//! # Usage
//!
//! ```text
//! invoicer render  --client c.json --invoice i.json [--output out.pdf] [--remote|--local] [--server host:port]
//! invoicer preview --client c.json --invoice i.json [--remote|--local] [--server host:port]
//! invoicer tex     --client c.json --invoice i.json [--output out.tex] [--list-placeholders]
//! invoicer next    --invoice i.json [--date YYYY-MM-DD]
//! invoicer config  [--json]
//! ```
//!
//! Global flags: `--config <file>` replaces `~/.invoicer/config.yaml`,
//! `--template <file>` replaces the embedded template.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    config::ConfigArgs, next::NextArgs, preview::PreviewArgs, render::RenderArgs, tex::TexArgs,
    GlobalArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "invoicer",
    version,
    about = "Render client and invoice records into PDF invoices",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile an invoice to PDF, locally or on the render service.
    Render(RenderArgs),

    /// Compile into a scratch area and open the result in the viewer.
    Preview(PreviewArgs),

    /// Write the filled-in LaTeX source without compiling it.
    Tex(TexArgs),

    /// Create the follow-up of an existing invoice.
    Next(NextArgs),

    /// Show the effective configuration.
    Config(ConfigArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Render(args) => args.run(&cli.global),
        Commands::Preview(args) => args.run(&cli.global),
        Commands::Tex(args) => args.run(&cli.global),
        Commands::Next(args) => args.run(),
        Commands::Config(args) => args.run(&cli.global),
    }
}

/// Logs go to stderr so stdout stays clean for command output.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
