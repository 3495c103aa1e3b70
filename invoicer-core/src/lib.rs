//! Invoicer core library: record types, JSON record files, errors.
//!
//! - [`types`]: client/invoice records and the caller's selection
//! - [`records`]: load / save / follow-up invoices
//! - [`error`]: [`RecordError`]

pub mod error;
pub mod records;
pub mod types;

pub use error::RecordError;
pub use types::{ClientRecord, Fields, InvoiceNumber, InvoiceRecord, Selection, Session};
