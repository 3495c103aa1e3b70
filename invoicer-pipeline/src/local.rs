//! Local compilation through an external LaTeX compiler.
//!
//! ## `render` steps
//!
//! 1. Acquire a working area.
//! 2. Stage the asset manifest (fonts, class file) into it.
//! 3. Write the rendered template to `render.tex`.
//! 4. Run the compiler with the area as working directory.
//! 5. If its output mentions "rerun" (any case), run it exactly once more.
//! 6. Copy `render.pdf` to the destination.
//! 7. Release the area with the grace delay, success or not.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::artifact::{persist_artifact, Artifact};
use crate::config::PipelineConfig;
use crate::error::{resource_err, CompileFailure, RenderError};
use crate::janitor::{ResourceJanitor, WorkingArea};
use crate::paths::{ARTIFACT_FILE, ASSET_MANIFEST, SOURCE_FILE};

/// Forward-search metadata on, never stop for interactive input.
pub const COMPILER_FLAGS: [&str; 2] = ["-synctex=1", "-interaction=nonstopmode"];

/// Hard cap on compiler passes. Not a fixed-point loop.
pub const MAX_PASSES: u8 = 2;

/// What the compiler runs produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileReport {
    pub passes: u8,
    /// Combined stdout + stderr of every pass, in order.
    pub transcript: String,
}

/// Drives the external compiler inside isolated working areas.
#[derive(Debug, Clone)]
pub struct LocalRenderer {
    janitor: ResourceJanitor,
    compiler: String,
    compiler_args: Vec<String>,
    asset_dir: PathBuf,
    release_delay: Duration,
    compile_timeout: Option<Duration>,
}

impl LocalRenderer {
    pub fn new(janitor: ResourceJanitor, config: &PipelineConfig) -> Self {
        LocalRenderer {
            janitor,
            compiler: config.compiler.clone(),
            compiler_args: config.compiler_args.clone(),
            asset_dir: config.asset_dir(),
            release_delay: config.release_delay(),
            compile_timeout: config.compile_timeout(),
        }
    }

    pub fn asset_dir(&self) -> &Path {
        &self.asset_dir
    }

    /// Compile `source` and write the resulting PDF to `destination`.
    pub async fn render(&self, source: &str, destination: &Path) -> Result<Artifact, RenderError> {
        let area = self.janitor.acquire()?;
        tracing::info!(area = %area.name(), "local render started");
        let result = self.render_in(&area, source, destination).await;
        if let Err(err) = &result {
            tracing::warn!(area = %area.name(), error = %err, "local render failed");
        }
        self.janitor.release(area, self.release_delay);
        result
    }

    async fn render_in(
        &self,
        area: &WorkingArea,
        source: &str,
        destination: &Path,
    ) -> Result<Artifact, RenderError> {
        let staged = stage_assets(&self.asset_dir, area.path()).await?;
        tracing::debug!(staged, area = %area.name(), "staged compiler assets");

        let source_path = area.join(SOURCE_FILE);
        tokio::fs::write(&source_path, source)
            .await
            .map_err(|e| resource_err(&source_path, e))?;

        let report = self.compile(area.path()).await?;

        let built = area.join(ARTIFACT_FILE);
        let bytes = match tokio::fs::read(&built).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(RenderError::Compile {
                    reason: CompileFailure::MissingArtifact { path: built },
                    output: report.transcript,
                });
            }
            Err(err) => return Err(resource_err(&built, err)),
        };

        persist_artifact(destination, bytes).await
    }

    /// Run the compiler in `workdir`, with at most one rerun pass.
    pub async fn compile(&self, workdir: &Path) -> Result<CompileReport, RenderError> {
        let mut transcript = String::new();
        let mut passes = 0;
        while passes < MAX_PASSES {
            passes += 1;
            let output = self.run_pass(workdir, passes, &transcript).await?;
            let rerun = needs_rerun(&output);
            transcript.push_str(&output);
            tracing::debug!(pass = passes, rerun, "compiler pass finished");
            if !rerun {
                break;
            }
        }
        Ok(CompileReport { passes, transcript })
    }

    async fn run_pass(&self, workdir: &Path, pass: u8, earlier: &str) -> Result<String, RenderError> {
        let mut command = Command::new(&self.compiler);
        command
            .args(&self.compiler_args)
            .args(COMPILER_FLAGS)
            .arg(SOURCE_FILE)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let run = command.output();
        let output = match self.compile_timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(output) => output,
                Err(_) => {
                    return Err(RenderError::Compile {
                        reason: CompileFailure::TimedOut { pass, limit },
                        output: earlier.to_string(),
                    });
                }
            },
            None => run.await,
        }
        .map_err(|source| RenderError::Compile {
            reason: CompileFailure::Spawn {
                program: self.compiler.clone(),
                source,
            },
            output: earlier.to_string(),
        })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(RenderError::Compile {
                reason: CompileFailure::Exit {
                    pass,
                    status: output.status,
                },
                output: format!("{earlier}{text}"),
            });
        }
        Ok(text)
    }
}

/// The compiler's own signal that cross-references are not settled yet.
pub fn needs_rerun(output: &str) -> bool {
    output.to_lowercase().contains("rerun")
}

/// Copy every manifest entry from `asset_dir` into `area`, keeping subpaths.
async fn stage_assets(asset_dir: &Path, area: &Path) -> Result<usize, RenderError> {
    for relative in ASSET_MANIFEST {
        let from = asset_dir.join(relative);
        let to = area.join(relative);
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| resource_err(parent, e))?;
        }
        tokio::fs::copy(&from, &to)
            .await
            .map_err(|e| resource_err(&from, e))?;
    }
    Ok(ASSET_MANIFEST.len())
}
