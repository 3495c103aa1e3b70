//! `invoicer tex --client <file> --invoice <file> [--output <file>] [--list-placeholders]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use invoicer_core::types::Session;
use invoicer_pipeline::RenderOrchestrator;
use invoicer_renderer::PlaceholderContext;

use super::{print_written, GlobalArgs, RecordArgs};

/// Write the filled-in LaTeX source without compiling it.
#[derive(Args, Debug)]
pub struct TexArgs {
    #[command(flatten)]
    pub records: RecordArgs,

    /// Destination `.tex` file. Defaults to the invoice file name with
    /// `.tex`, next to the invoice.
    #[arg(long, short = 'o', value_name = "FILE", conflicts_with = "list_placeholders")]
    pub output: Option<PathBuf>,

    /// Print the placeholders these records fill, in substitution order.
    #[arg(long)]
    pub list_placeholders: bool,
}

#[derive(Tabled)]
struct PlaceholderRow {
    #[tabled(rename = "placeholder")]
    placeholder: String,
    #[tabled(rename = "value")]
    value: String,
}

impl TexArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let mut session = Session::default();
        let selection = self.records.load(&mut session)?;

        if self.list_placeholders {
            if let Some((client, invoice)) = selection.pair() {
                print_placeholders(&PlaceholderContext::from_records(client, invoice));
            }
            return Ok(());
        }

        let config = global.load_config()?;
        let orchestrator =
            RenderOrchestrator::new(&config).context("failed to load the template")?;
        let Some(text) = orchestrator.generate_template_text(&selection) else {
            return Ok(());
        };

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| self.records.default_output(&session, "tex"));
        std::fs::write(&output, &text)
            .with_context(|| format!("failed to write '{}'", output.display()))?;
        print_written(&output, &format!("({} bytes)", text.len()));
        Ok(())
    }
}

fn print_placeholders(context: &PlaceholderContext) {
    let rows: Vec<PlaceholderRow> = context
        .iter()
        .map(|s| PlaceholderRow {
            placeholder: s.placeholder.clone(),
            value: s.value.clone(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
