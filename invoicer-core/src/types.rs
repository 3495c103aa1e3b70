//! Domain types for invoice rendering.
//!
//! Records are plain data owned by the caller. The pipeline only reads them;
//! nothing here performs I/O.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form business fields, keyed by their JSON name.
pub type Fields = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Sequence number of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceNumber(pub u32);

impl InvoiceNumber {
    /// The number that follows this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u32> for InvoiceNumber {
    fn from(n: u32) -> Self {
        Self(n)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The party being billed.
///
/// Only `name` is interpreted; every other JSON key (address, tax id, …) is
/// kept in `fields` and exposed to the template as-is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClientRecord {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl ClientRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Fields::new(),
        }
    }

    /// Builder-style helper for attaching an extra field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// A single invoice.
///
/// `number` and `date` are read directly by the pipeline (the remote
/// service receives the date on the wire); `project` is a display label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    #[serde(alias = "Number")]
    pub number: InvoiceNumber,
    /// Serialized as `YYYY-MM-DD`.
    #[serde(alias = "Date")]
    pub date: NaiveDate,
    #[serde(default, alias = "Project")]
    pub project: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl InvoiceRecord {
    pub fn new(number: impl Into<InvoiceNumber>, date: NaiveDate, project: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            date,
            project: project.into(),
            fields: Fields::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// The invoice date in its wire/text form.
    pub fn date_text(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Short label in the form `<7> Q1 Report`.
    pub fn label(&self) -> String {
        format!("<{}> {}", self.number, self.project)
    }

    /// A follow-up invoice: same project and fields, next number, new date.
    pub fn successor(&self, date: NaiveDate) -> Self {
        Self {
            number: self.number.next(),
            date,
            project: self.project.clone(),
            fields: self.fields.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Selection + session state
// ---------------------------------------------------------------------------

/// The records a caller has picked for rendering.
///
/// Either side may still be missing; render entry points treat an
/// incomplete selection as "nothing to render".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub client: Option<ClientRecord>,
    pub invoice: Option<InvoiceRecord>,
}

impl Selection {
    pub fn new(client: ClientRecord, invoice: InvoiceRecord) -> Self {
        Self {
            client: Some(client),
            invoice: Some(invoice),
        }
    }

    /// Both records, when both are present.
    pub fn pair(&self) -> Option<(&ClientRecord, &InvoiceRecord)> {
        match (&self.client, &self.invoice) {
            (Some(client), Some(invoice)) => Some((client, invoice)),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pair().is_some()
    }
}

/// Per-caller convenience state carried between operations.
///
/// Holds the directory a record was last loaded from, so follow-up saves
/// default next to it. Not safety-critical; may be stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    last_dir: Option<PathBuf>,
}

impl Session {
    /// Remember the directory containing `path`.
    pub fn remember(&mut self, path: &Path) {
        let dir = if path.is_dir() {
            Some(path.to_path_buf())
        } else {
            path.parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
        };
        if dir.is_some() {
            self.last_dir = dir;
        }
    }

    pub fn last_dir(&self) -> Option<&Path> {
        self.last_dir.as_deref()
    }

    /// The last remembered directory, else the current working directory.
    pub fn start_dir(&self) -> PathBuf {
        self.last_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    #[test]
    fn invoice_number_display_and_next() {
        assert_eq!(InvoiceNumber(7).to_string(), "7");
        assert_eq!(InvoiceNumber(7).next(), InvoiceNumber(8));
        assert_eq!(InvoiceNumber(u32::MAX).next(), InvoiceNumber(u32::MAX));
    }

    #[test]
    fn invoice_serde_keeps_extra_fields() {
        let json = r#"{"number":7,"date":"2024-01-15","project":"Q1 Report","hours":12.5}"#;
        let invoice: InvoiceRecord = serde_json::from_str(json).expect("parse");
        assert_eq!(invoice.number, InvoiceNumber(7));
        assert_eq!(invoice.date_text(), "2024-01-15");
        assert_eq!(invoice.fields["hours"], serde_json::json!(12.5));

        let back = serde_json::to_value(&invoice).expect("serialize");
        assert_eq!(back["date"], "2024-01-15");
        assert_eq!(back["hours"], serde_json::json!(12.5));
    }

    #[test]
    fn capitalised_keys_are_accepted() {
        let json = r#"{"Number":3,"Date":"2023-12-01","Project":"Audit"}"#;
        let invoice: InvoiceRecord = serde_json::from_str(json).expect("parse");
        assert_eq!(invoice.number, InvoiceNumber(3));
        assert_eq!(invoice.project, "Audit");

        let client: ClientRecord = serde_json::from_str(r#"{"Name":"Acme"}"#).expect("parse");
        assert_eq!(client.name, "Acme");
    }

    #[test]
    fn successor_bumps_number_and_date() {
        let invoice = InvoiceRecord::new(7, date("2024-01-15"), "Q1 Report").with_field("rate", 90);
        let next = invoice.successor(date("2024-02-01"));
        assert_eq!(next.number, InvoiceNumber(8));
        assert_eq!(next.date_text(), "2024-02-01");
        assert_eq!(next.project, "Q1 Report");
        assert_eq!(next.fields, invoice.fields);
    }

    #[test]
    fn selection_pair_requires_both_records() {
        let mut selection = Selection::default();
        assert!(selection.pair().is_none());
        selection.client = Some(ClientRecord::new("Acme"));
        assert!(!selection.is_complete());
        selection.invoice = Some(InvoiceRecord::new(1, date("2024-01-01"), "x"));
        assert!(selection.is_complete());
    }

    #[test]
    fn session_remembers_parent_directory() {
        let mut session = Session::default();
        assert!(session.last_dir().is_none());
        session.remember(Path::new("/records/acme/invoice_7.json"));
        assert_eq!(session.last_dir(), Some(Path::new("/records/acme")));
        session.remember(Path::new("bare.json"));
        assert_eq!(
            session.last_dir(),
            Some(Path::new("/records/acme")),
            "a bare file name carries no directory to remember"
        );
    }
}
