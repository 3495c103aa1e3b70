use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use crate::remote::ExchangeState;

/// Error surface for the rendering pipeline.
///
/// Every variant is terminal for the render that produced it. The payload
/// carries what is needed to diagnose without re-running: compiler output,
/// or the protocol step and line at which the exchange went wrong.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("working area error at {path}: {source}")]
    Resource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("compilation failed: {reason}")]
    Compile {
        #[source]
        reason: CompileFailure,
        /// Captured compiler stdout + stderr, all passes.
        output: String,
    },

    #[error("cannot connect to render service {server}: {source}")]
    Connection {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("protocol error while {step}: expected {expected}, got {line:?}")]
    Protocol {
        step: ExchangeState,
        expected: String,
        line: String,
    },

    #[error("transport error while {step}: {reason}")]
    Transport {
        step: ExchangeState,
        #[source]
        reason: TransportFailure,
    },

    #[error("cannot write artifact to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template error: {0}")]
    Template(#[from] invoicer_renderer::TemplateError),

    #[error("invalid configuration at {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("render task failed: {0}")]
    Task(String),
}

/// Why a compiler run was rejected.
#[derive(Debug, Error)]
pub enum CompileFailure {
    #[error("could not start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("pass {pass} exited with {status}")]
    Exit { pass: u8, status: ExitStatus },

    #[error("pass {pass} did not finish within {limit:?}")]
    TimedOut { pass: u8, limit: Duration },

    #[error("no output artifact at {path}")]
    MissingArtifact { path: PathBuf },
}

/// Why a stream read or write failed mid-exchange.
#[derive(Debug, Error)]
pub enum TransportFailure {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("no progress within {0:?}")]
    TimedOut(Duration),

    #[error("peer closed the connection")]
    Closed,

    #[error("declared {declared} bytes but received {received}")]
    LengthMismatch { declared: u64, received: u64 },
}

/// Coarse tag of a [`RenderError`], for callers that only present a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Resource,
    Compile,
    Connection,
    Protocol,
    Transport,
    Persist,
    Template,
    Config,
    Task,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Resource => "resource",
            ErrorKind::Compile => "compile",
            ErrorKind::Connection => "connection",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Transport => "transport",
            ErrorKind::Persist => "persist",
            ErrorKind::Template => "template",
            ErrorKind::Config => "config",
            ErrorKind::Task => "task",
        };
        f.write_str(name)
    }
}

impl RenderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::Resource { .. } => ErrorKind::Resource,
            RenderError::Compile { .. } => ErrorKind::Compile,
            RenderError::Connection { .. } => ErrorKind::Connection,
            RenderError::Protocol { .. } => ErrorKind::Protocol,
            RenderError::Transport { .. } => ErrorKind::Transport,
            RenderError::Persist { .. } => ErrorKind::Persist,
            RenderError::Template(_) => ErrorKind::Template,
            RenderError::Config { .. } => ErrorKind::Config,
            RenderError::Task(_) => ErrorKind::Task,
        }
    }

    /// Captured compiler output, for [`RenderError::Compile`].
    pub fn compiler_output(&self) -> Option<&str> {
        match self {
            RenderError::Compile { output, .. } => Some(output),
            _ => None,
        }
    }
}

pub(crate) fn resource_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Resource {
        path: path.into(),
        source,
    }
}

pub(crate) fn persist_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Persist {
        path: path.into(),
        source,
    }
}

pub(crate) fn transport_err(step: ExchangeState, reason: impl Into<TransportFailure>) -> RenderError {
    RenderError::Transport {
        step,
        reason: reason.into(),
    }
}
