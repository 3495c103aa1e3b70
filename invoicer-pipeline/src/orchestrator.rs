//! Entry points that turn a selection into an artifact.
//!
//! [`RenderOrchestrator::render`] runs on the caller's task;
//! [`RenderOrchestrator::spawn`] and [`RenderOrchestrator::spawn_with`] move
//! the render onto a background tokio task and report the outcome through a
//! future or a callback.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::NaiveDate;
use invoicer_core::types::Selection;
use invoicer_renderer::TemplateEngine;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::artifact::{Artifact, RenderOutcome};
use crate::config::PipelineConfig;
use crate::error::RenderError;
use crate::janitor::ResourceJanitor;
use crate::local::LocalRenderer;
use crate::remote::RemoteRenderClient;

/// Where compilation happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Local,
    Remote,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderMode::Local => f.write_str("local"),
            RenderMode::Remote => f.write_str("remote"),
        }
    }
}

/// Everything one render needs once the template has been filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub source: String,
    pub invoice_date: NaiveDate,
    pub destination: PathBuf,
    pub mode: RenderMode,
}

#[derive(Debug)]
struct Inner {
    engine: TemplateEngine,
    janitor: ResourceJanitor,
    local: LocalRenderer,
    remote: RemoteRenderClient,
}

/// Cheap to clone; clones share the same read-only engine and renderers.
#[derive(Debug, Clone)]
pub struct RenderOrchestrator {
    inner: Arc<Inner>,
}

impl RenderOrchestrator {
    /// Build the engine (embedded or `config.template`), janitor and both
    /// renderers from `config`.
    pub fn new(config: &PipelineConfig) -> Result<Self, RenderError> {
        let engine = TemplateEngine::new(config.template.as_deref())?;
        let janitor = ResourceJanitor::new(config.scratch_dir.clone());
        let local = LocalRenderer::new(janitor.clone(), config);
        let remote = RemoteRenderClient::new(config);
        Ok(Self::from_parts(engine, janitor, local, remote))
    }

    pub fn from_parts(
        engine: TemplateEngine,
        janitor: ResourceJanitor,
        local: LocalRenderer,
        remote: RemoteRenderClient,
    ) -> Self {
        RenderOrchestrator {
            inner: Arc::new(Inner {
                engine,
                janitor,
                local,
                remote,
            }),
        }
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.inner.engine
    }

    pub fn janitor(&self) -> &ResourceJanitor {
        &self.inner.janitor
    }

    pub fn local(&self) -> &LocalRenderer {
        &self.inner.local
    }

    pub fn remote(&self) -> &RemoteRenderClient {
        &self.inner.remote
    }

    /// The filled-in template, or `None` when a record is missing.
    pub fn generate_template_text(&self, selection: &Selection) -> Option<String> {
        let (client, invoice) = selection.pair()?;
        Some(self.inner.engine.render(client, invoice))
    }

    /// Build the request for `selection`, or `None` when a record is missing.
    pub fn request(
        &self,
        mode: RenderMode,
        selection: &Selection,
        destination: impl Into<PathBuf>,
    ) -> Option<RenderRequest> {
        let (client, invoice) = selection.pair()?;
        Some(RenderRequest {
            source: self.inner.engine.render(client, invoice),
            invoice_date: invoice.date,
            destination: destination.into(),
            mode,
        })
    }

    /// Render `selection` to `destination` on the current task.
    pub async fn render(
        &self,
        mode: RenderMode,
        selection: &Selection,
        destination: &Path,
    ) -> Result<RenderOutcome, RenderError> {
        let Some(request) = self.request(mode, selection, destination) else {
            tracing::debug!("selection incomplete, nothing to render");
            return Ok(RenderOutcome::NothingToRender);
        };
        self.execute(request).await.map(RenderOutcome::Completed)
    }

    /// Dispatch a prepared request to the renderer for its mode.
    pub async fn execute(&self, request: RenderRequest) -> Result<Artifact, RenderError> {
        tracing::info!(
            mode = %request.mode,
            destination = %request.destination.display(),
            "render requested"
        );
        let result = match request.mode {
            RenderMode::Local => {
                self.inner
                    .local
                    .render(&request.source, &request.destination)
                    .await
            }
            RenderMode::Remote => {
                self.inner
                    .remote
                    .render(&request.source, request.invoice_date, &request.destination)
                    .await
            }
        };
        match &result {
            Ok(artifact) => {
                tracing::info!(mode = %request.mode, bytes = artifact.len(), "render finished")
            }
            Err(err) => {
                tracing::warn!(mode = %request.mode, kind = %err.kind(), error = %err, "render failed")
            }
        }
        result
    }

    /// Run the render on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, mode: RenderMode, selection: Selection, destination: PathBuf) -> RenderTask {
        let orchestrator = self.clone();
        let handle =
            tokio::spawn(async move { orchestrator.render(mode, &selection, &destination).await });
        RenderTask { handle }
    }

    /// Run the render on a background task and hand the outcome to
    /// `on_complete` there.
    pub fn spawn_with<F>(
        &self,
        mode: RenderMode,
        selection: Selection,
        destination: PathBuf,
        on_complete: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<RenderOutcome, RenderError>) + Send + 'static,
    {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let outcome = orchestrator.render(mode, &selection, &destination).await;
            on_complete(outcome);
        })
    }
}

/// A render running on a background task.
///
/// Await it for the outcome. Dropping it leaves the render running.
#[derive(Debug)]
pub struct RenderTask {
    handle: JoinHandle<Result<RenderOutcome, RenderError>>,
}

impl RenderTask {
    /// Stop the render at its next suspension point. Its working area is
    /// still removed.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for RenderTask {
    type Output = Result<RenderOutcome, RenderError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| match joined {
            Ok(outcome) => outcome,
            Err(err) => Err(RenderError::Task(err.to_string())),
        })
    }
}
