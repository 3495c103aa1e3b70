//! Render results and the final write to the caller's destination.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{persist_err, RenderError};

/// A compiled document that has been written to its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hex SHA-256 of the artifact bytes.
    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

/// Result of a render entry point that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The artifact exists, complete, at its destination.
    Completed(Artifact),
    /// The selection lacked a client or an invoice; nothing was attempted.
    NothingToRender,
}

impl RenderOutcome {
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            RenderOutcome::Completed(artifact) => Some(artifact),
            RenderOutcome::NothingToRender => None,
        }
    }

    pub fn into_artifact(self) -> Option<Artifact> {
        match self {
            RenderOutcome::Completed(artifact) => Some(artifact),
            RenderOutcome::NothingToRender => None,
        }
    }
}

/// Write `bytes` to `destination` via a `.invoicer.tmp` sibling and a rename,
/// so the destination is either absent or complete.
pub(crate) async fn persist_artifact(
    destination: &Path,
    bytes: Vec<u8>,
) -> Result<Artifact, RenderError> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| persist_err(parent, e))?;
    }

    let mut tmp = destination.as_os_str().to_owned();
    tmp.push(".invoicer.tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| persist_err(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, destination).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(persist_err(destination, e));
    }

    tracing::info!(path = %destination.display(), bytes = bytes.len(), "wrote artifact");
    Ok(Artifact {
        path: destination.to_path_buf(),
        bytes,
    })
}
