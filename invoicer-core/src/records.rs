//! JSON record files.
//!
//! Clients and invoices live in standalone `*.json` files chosen by the
//! caller. Saves go through a `<path>.invoicer.tmp` sibling and a rename, so a
//! reader never observes a half-written record.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{io_err, RecordError};
use crate::types::{ClientRecord, InvoiceNumber, InvoiceRecord};

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, RecordError> {
    let raw = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&raw).map_err(|source| RecordError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a client record from `path`.
pub fn load_client(path: &Path) -> Result<ClientRecord, RecordError> {
    load_json(path)
}

/// Load an invoice record from `path`.
pub fn load_invoice(path: &Path) -> Result<InvoiceRecord, RecordError> {
    load_json(path)
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RecordError> {
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".invoicer.tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, body).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Write `client` to `path`, replacing any existing file.
pub fn save_client(path: &Path, client: &ClientRecord) -> Result<(), RecordError> {
    save_json(path, client)
}

/// Write `invoice` to `path`, replacing any existing file.
pub fn save_invoice(path: &Path, invoice: &InvoiceRecord) -> Result<(), RecordError> {
    save_json(path, invoice)
}

// ---------------------------------------------------------------------------
// Follow-up invoices
// ---------------------------------------------------------------------------

/// File name for the invoice following the one stored at `path`.
///
/// The first occurrence of `old` in the file name is replaced by `new`
/// (`invoice_7.json` → `invoice_8.json`). When the file name does not mention
/// the number, `_new` goes before the extension (`acme.json` → `acme_new.json`).
/// Only the file name is rewritten, never the parent directories.
pub fn successor_path(path: &Path, old: InvoiceNumber, new: InvoiceNumber) -> PathBuf {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return path.with_file_name("invoice_new.json");
    };

    let renamed = name.replacen(&old.to_string(), &new.to_string(), 1);
    if renamed != name {
        return path.with_file_name(renamed);
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let file = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_new.{ext}"),
        None => format!("{stem}_new"),
    };
    path.with_file_name(file)
}

/// Create and save the follow-up of the invoice stored at `path`.
///
/// Returns the new file's path and record. Refuses to overwrite an existing
/// file with [`RecordError::AlreadyExists`].
pub fn create_successor(
    path: &Path,
    date: NaiveDate,
) -> Result<(PathBuf, InvoiceRecord), RecordError> {
    let current = load_invoice(path)?;
    let next = current.successor(date);
    let target = successor_path(path, current.number, next.number);
    if target.exists() {
        return Err(RecordError::AlreadyExists { path: target });
    }
    save_invoice(&target, &next)?;
    Ok((target, next))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
