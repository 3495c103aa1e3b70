//! `invoicer config [--json]`

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use invoicer_renderer::context::value_text;

use super::GlobalArgs;

/// Show the effective configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ConfigRow {
    #[tabled(rename = "setting")]
    key: String,
    #[tabled(rename = "value")]
    value: String,
}

impl ConfigArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        let value = serde_json::to_value(&config).context("failed to serialize configuration")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&value).context("failed to render configuration JSON")?
            );
            return Ok(());
        }

        let rows: Vec<ConfigRow> = match value {
            Value::Object(map) => map
                .into_iter()
                .map(|(key, value)| ConfigRow {
                    key,
                    value: match value {
                        Value::Null => "-".to_string(),
                        other => value_text(&other),
                    },
                })
                .collect(),
            _ => Vec::new(),
        };
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
