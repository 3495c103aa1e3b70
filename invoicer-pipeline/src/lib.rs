//! # invoicer-pipeline
//!
//! Turns a client/invoice selection into a PDF, either through a local LaTeX
//! compiler or through the remote render service.
//!
//! - [`janitor`]: ephemeral working areas and their delayed removal
//! - [`local`]: compiler subprocess with one optional rerun pass
//! - [`remote`]: `begin_send` framing over TCP
//! - [`orchestrator`]: mode dispatch and background render tasks
//! - [`config`]: `~/.invoicer/config.yaml`
//!
//! ```no_run
//! # async fn demo() -> Result<(), invoicer_pipeline::RenderError> {
//! use std::path::Path;
//! use invoicer_core::types::{ClientRecord, InvoiceRecord, Selection};
//! use invoicer_pipeline::{PipelineConfig, RenderMode, RenderOrchestrator};
//!
//! let config = PipelineConfig::load()?;
//! let orchestrator = RenderOrchestrator::new(&config)?;
//! let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
//! let selection = Selection::new(ClientRecord::new("Acme"), InvoiceRecord::new(7, date, "Q1 Report"));
//! let outcome = orchestrator
//!     .render(RenderMode::Local, &selection, Path::new("invoice.pdf"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod config;
mod error;
pub mod janitor;
pub mod local;
pub mod orchestrator;
pub mod paths;
pub mod remote;

pub use artifact::{Artifact, RenderOutcome};
pub use config::PipelineConfig;
pub use error::{CompileFailure, ErrorKind, RenderError, TransportFailure};
pub use janitor::{CleanupHandle, ResourceJanitor, WorkingArea};
pub use local::{CompileReport, LocalRenderer};
pub use orchestrator::{RenderMode, RenderOrchestrator, RenderRequest, RenderTask};
pub use remote::{ExchangeLimits, ExchangeState, RemoteRenderClient, RemoteSession};
