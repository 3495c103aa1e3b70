//! Ephemeral working areas.
//!
//! [`ResourceJanitor::acquire`] creates a uniquely named directory owned by a
//! single render. [`ResourceJanitor::release`] removes it after a grace
//! period on a background task, whatever the render's outcome. An area that
//! is dropped without being released is removed on the spot.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::task::JoinHandle;

use crate::error::{resource_err, RenderError};
use crate::paths::WORKING_AREA_PREFIX;

/// A directory exclusively owned by one render.
#[derive(Debug)]
pub struct WorkingArea {
    dir: TempDir,
}

impl WorkingArea {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// The generated directory name.
    pub fn name(&self) -> String {
        self.dir
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Creates working areas and schedules their removal.
#[derive(Debug, Clone, Default)]
pub struct ResourceJanitor {
    root: Option<PathBuf>,
}

impl ResourceJanitor {
    /// Areas are created under `root`, or the system temp dir when `None`.
    pub fn new(root: Option<PathBuf>) -> Self {
        ResourceJanitor { root }
    }

    pub fn root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Create a fresh, uniquely named working area.
    pub fn acquire(&self) -> Result<WorkingArea, RenderError> {
        let root = self.root();
        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(|e| resource_err(&root, e))?;
        }
        let dir = tempfile::Builder::new()
            .prefix(WORKING_AREA_PREFIX)
            .tempdir_in(&root)
            .map_err(|e| resource_err(&root, e))?;
        tracing::debug!(area = %dir.path().display(), "acquired working area");
        Ok(WorkingArea { dir })
    }

    /// Remove `area` and everything under it once `delay` has elapsed.
    ///
    /// Must be called from within a tokio runtime. Removal failures are
    /// logged, never returned.
    pub fn release(&self, area: WorkingArea, delay: Duration) -> CleanupHandle {
        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let path = area.path().to_path_buf();
            let removed = tokio::task::spawn_blocking(move || area.dir.close()).await;
            match removed {
                Ok(Ok(())) => tracing::debug!(area = %path.display(), "removed working area"),
                Ok(Err(err)) => {
                    tracing::warn!(area = %path.display(), error = %err, "failed to remove working area")
                }
                Err(err) => {
                    tracing::warn!(area = %path.display(), error = %err, "working area cleanup task failed")
                }
            }
        });
        CleanupHandle { handle }
    }
}

/// Handle to a scheduled removal.
///
/// Dropping the handle does not cancel the removal.
#[derive(Debug)]
pub struct CleanupHandle {
    handle: JoinHandle<()>,
}

impl CleanupHandle {
    /// Wait until the area has been removed.
    pub async fn wait(self) {
        let _ = self.handle.await;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_creates_distinct_prefixed_areas() {
        let root = TempDir::new().expect("root");
        let janitor = ResourceJanitor::new(Some(root.path().to_path_buf()));

        let a = janitor.acquire().expect("first area");
        let b = janitor.acquire().expect("second area");
        assert_ne!(a.path(), b.path());
        assert!(a.name().starts_with(WORKING_AREA_PREFIX));
        assert!(a.path().starts_with(root.path()));
        assert!(a.path().is_dir() && b.path().is_dir());
    }

    #[tokio::test]
    async fn release_removes_area_after_delay() {
        let root = TempDir::new().expect("root");
        let janitor = ResourceJanitor::new(Some(root.path().to_path_buf()));
        let area = janitor.acquire().expect("area");
        let path = area.path().to_path_buf();
        std::fs::create_dir_all(area.join("Fonts")).expect("mkdir");
        std::fs::write(area.join("Fonts/a.ttf"), b"font").expect("write");

        let handle = janitor.release(area, Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(path.exists(), "area must survive the grace period");

        handle.wait().await;
        assert!(!path.exists(), "area must be gone after release");
    }

    #[tokio::test]
    async fn handle_reports_finished_once_area_is_gone() {
        let root = TempDir::new().expect("root");
        let janitor = ResourceJanitor::new(Some(root.path().to_path_buf()));
        let area = janitor.acquire().expect("area");
        let path = area.path().to_path_buf();

        let handle = janitor.release(area, Duration::from_millis(200));
        assert!(!handle.is_finished());
        for _ in 0..100 {
            if handle.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(handle.is_finished());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn dropped_area_is_removed_immediately() {
        let root = TempDir::new().expect("root");
        let janitor = ResourceJanitor::new(Some(root.path().to_path_buf()));
        let area = janitor.acquire().expect("area");
        let path = area.path().to_path_buf();
        drop(area);
        assert!(!path.exists());
    }

    #[test]
    fn acquire_under_unwritable_root_is_resource_error() {
        let root = TempDir::new().expect("root");
        let blocker = root.path().join("file");
        std::fs::write(&blocker, b"not a dir").expect("write");

        let janitor = ResourceJanitor::new(Some(blocker.join("nested")));
        let err = janitor.acquire().unwrap_err();
        assert!(matches!(err, RenderError::Resource { .. }), "got: {err}");
    }
}
