//! Placeholder context: the flat `(placeholder, value)` view of a client and
//! an invoice that the template engine substitutes.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use invoicer_core::types::{ClientRecord, Fields, InvoiceRecord};

/// Namespace prefix for client placeholders (`<<CLIENT_NAME>>`).
pub const CLIENT_PREFIX: &str = "CLIENT_";
/// Namespace prefix for invoice placeholders (`<<INVOICE_NUMBER>>`).
pub const INVOICE_PREFIX: &str = "INVOICE_";

const OPEN: &str = "<<";
const CLOSE: &str = ">>";

/// One literal replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Substitution {
    pub placeholder: String,
    pub value: String,
}

/// Substitutions for both records, in application order.
///
/// Client substitutions come first, then invoice substitutions. Within each
/// record the order is the sorted placeholder name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceholderContext {
    pub client: Vec<Substitution>,
    pub invoice: Vec<Substitution>,
}

impl PlaceholderContext {
    /// Build the context for a client/invoice pair.
    pub fn from_records(client: &ClientRecord, invoice: &InvoiceRecord) -> Self {
        let client_core = [("name", client.name.clone())];
        let invoice_core = [
            ("number", invoice.number.to_string()),
            ("date", invoice.date_text()),
            ("project", invoice.project.clone()),
        ];

        PlaceholderContext {
            client: substitutions(CLIENT_PREFIX, &client.fields, &client_core),
            invoice: substitutions(INVOICE_PREFIX, &invoice.fields, &invoice_core),
        }
    }

    /// All substitutions, client namespace first.
    pub fn iter(&self) -> impl Iterator<Item = &Substitution> {
        self.client.iter().chain(self.invoice.iter())
    }

    /// Replace every recognised placeholder in `template`.
    pub fn apply(&self, template: &str) -> String {
        self.iter().fold(template.to_string(), |text, sub| {
            if text.contains(&sub.placeholder) {
                text.replace(&sub.placeholder, &sub.value)
            } else {
                text
            }
        })
    }
}

/// `<<PREFIXKEY>>` for a record field.
///
/// The key is upper-cased and anything that is not ASCII alphanumeric becomes
/// `_`, so `tax-id` maps to `<<CLIENT_TAX_ID>>`.
pub fn placeholder(prefix: &str, key: &str) -> String {
    format!("{OPEN}{prefix}{}{CLOSE}", normalize_key(key))
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn substitutions(prefix: &str, extras: &Fields, core: &[(&str, String)]) -> Vec<Substitution> {
    // Keys that normalise to the same placeholder collapse: among extras the
    // last key in sorted order wins. Core fields go in last so they win over
    // free-form ones.
    let mut by_placeholder: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in extras {
        if !key.is_empty() {
            by_placeholder.insert(placeholder(prefix, key), value_text(value));
        }
    }
    for (key, value) in core {
        by_placeholder.insert(placeholder(prefix, key), value.clone());
    }
    by_placeholder
        .into_iter()
        .map(|(placeholder, value)| Substitution { placeholder, value })
        .collect()
}

/// Text form of a free-form field value.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
