//! # invoicer-renderer
//!
//! Literal placeholder substitution that merges a client and an invoice
//! record into the LaTeX invoice template.
//!
//! ## Usage
//!
//! ```rust
//! use invoicer_core::types::{ClientRecord, InvoiceRecord};
//! use invoicer_renderer::render_template;
//!
//! let client = ClientRecord::new("Acme");
//! let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
//! let invoice = InvoiceRecord::new(7, date, "Q1 Report");
//!
//! let text = render_template(
//!     "Bill to <<CLIENT_NAME>>, Invoice #<<INVOICE_NUMBER>>",
//!     &client,
//!     &invoice,
//! );
//! assert_eq!(text, "Bill to Acme, Invoice #7");
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::{PlaceholderContext, Substitution};
pub use engine::{render_template, TemplateEngine, TemplateSource, INVOICE_TEMPLATE};
pub use error::TemplateError;
