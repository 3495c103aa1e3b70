//! `invoicer next --invoice <file> [--date YYYY-MM-DD]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use colored::Colorize;

use invoicer_core::records;

/// Create the follow-up of an existing invoice: next number, new date.
#[derive(Args, Debug)]
pub struct NextArgs {
    /// Invoice record to continue from (JSON).
    #[arg(long, short = 'i', value_name = "FILE")]
    pub invoice: PathBuf,

    /// Date of the new invoice. Defaults to today.
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,
}

impl NextArgs {
    pub fn run(self) -> Result<()> {
        let date = self
            .date
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        let (path, invoice) = records::create_successor(&self.invoice, date).with_context(|| {
            format!("failed to create follow-up of '{}'", self.invoice.display())
        })?;

        println!("{} Created invoice {}", "✓".green(), invoice.label());
        println!("  Saved to: {}", path.display());
        Ok(())
    }
}
