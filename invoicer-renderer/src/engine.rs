//! Placeholder substitution engine: [`TemplateEngine`] and [`render_template`].
//!
//! # Placeholder syntax
//!
//! | Record  | Field            | Placeholder            |
//! |---------|------------------|------------------------|
//! | Client  | `name`           | `<<CLIENT_NAME>>`      |
//! | Client  | any extra `key`  | `<<CLIENT_KEY>>`       |
//! | Invoice | `number`         | `<<INVOICE_NUMBER>>`   |
//! | Invoice | `date`           | `<<INVOICE_DATE>>`     |
//! | Invoice | `project`        | `<<INVOICE_PROJECT>>`  |
//! | Invoice | any extra `key`  | `<<INVOICE_KEY>>`      |
//!
//! `KEY` is the field name upper-cased, with every character other than an
//! ASCII letter or digit turned into `_`. Extra keys that normalise to the
//! same placeholder (`tax-id`, `tax_id`) collapse into one: the key that sorts
//! last supplies the value, and a core field always beats an extra one.
//!
//! Substitution is literal: no escaping, no expressions. Placeholders without
//! a matching field are left untouched.
//!
//! # Embedded template fields
//!
//! Besides the core fields, [`INVOICE_TEMPLATE`] reads two extra fields that
//! records are expected to carry:
//!
//! - client `address`: LaTeX lines for the "Bill To" box,
//! - invoice `items`: the LaTeX rows of the invoice table.
//!
//! A record without them leaves `<<CLIENT_ADDRESS>>` / `<<INVOICE_ITEMS>>` in
//! the source; set them to `""` to render an empty box or table.

use std::path::{Path, PathBuf};

use invoicer_core::types::{ClientRecord, InvoiceRecord};

use crate::context::PlaceholderContext;
use crate::error::TemplateError;

/// The invoice template, baked into the binary at compile time.
pub const INVOICE_TEMPLATE: &str = include_str!("templates/invoice.tex");

/// Substitute `client` then `invoice` fields into `template`.
///
/// Pure and deterministic: the same inputs always give byte-identical output.
pub fn render_template(template: &str, client: &ClientRecord, invoice: &InvoiceRecord) -> String {
    PlaceholderContext::from_records(client, invoice).apply(template)
}

/// Where the engine's template text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Embedded,
    File(PathBuf),
    Inline,
}

/// Holds one loaded template and renders records into it.
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    template: String,
    source: TemplateSource,
}

impl TemplateEngine {
    /// Load the embedded template, or `user_template` when given.
    pub fn new(user_template: Option<&Path>) -> Result<Self, TemplateError> {
        match user_template {
            None => Ok(Self::embedded()),
            Some(path) => {
                let template = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Ok(TemplateEngine {
                    template,
                    source: TemplateSource::File(path.to_path_buf()),
                })
            }
        }
    }

    pub fn embedded() -> Self {
        TemplateEngine {
            template: INVOICE_TEMPLATE.to_string(),
            source: TemplateSource::Embedded,
        }
    }

    /// Engine over caller-supplied template text.
    pub fn from_text(template: impl Into<String>) -> Self {
        TemplateEngine {
            template: template.into(),
            source: TemplateSource::Inline,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn source(&self) -> &TemplateSource {
        &self.source
    }

    /// Render the loaded template for a client/invoice pair.
    pub fn render(&self, client: &ClientRecord, invoice: &InvoiceRecord) -> String {
        render_template(&self.template, client, invoice)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::embedded()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
