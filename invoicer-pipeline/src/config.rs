//! Pipeline configuration, read from `~/.invoicer/config.yaml`.
//!
//! Every field has a default, so a missing file or an empty document is a
//! valid configuration. Timeouts set to `null` are disabled.
//!
//! ```yaml
//! server: render.example.net:7714
//! compiler: xelatex
//! asset_dir: /opt/invoicer/assets
//! release_delay_ms: 1000
//! io_timeout_secs: ~
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::orchestrator::RenderMode;
use crate::paths::{
    assets_dir, config_path, DEFAULT_COMPILER, DEFAULT_MAX_ARTIFACT_BYTES, DEFAULT_RELEASE_DELAY,
    DEFAULT_SERVER,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// `host:port` of the remote render service.
    pub server: String,
    /// Mode used when the caller does not pick one.
    pub default_mode: RenderMode,
    /// Compiler executable for local renders.
    pub compiler: String,
    /// Arguments placed before the fixed compiler flags.
    pub compiler_args: Vec<String>,
    /// Directory holding the fonts and class file staged for local renders.
    pub asset_dir: Option<PathBuf>,
    /// Parent directory for working areas (system temp dir when unset).
    pub scratch_dir: Option<PathBuf>,
    /// User template replacing the embedded one.
    pub template: Option<PathBuf>,
    /// Grace period before a released working area is removed.
    pub release_delay_ms: u64,
    pub connect_timeout_secs: Option<u64>,
    pub io_timeout_secs: Option<u64>,
    pub compile_timeout_secs: Option<u64>,
    /// Upper bound on the artifact length a server may declare.
    pub max_artifact_bytes: u64,
    /// Program used to open previews.
    pub viewer: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            server: DEFAULT_SERVER.to_string(),
            default_mode: RenderMode::Remote,
            compiler: DEFAULT_COMPILER.to_string(),
            compiler_args: Vec::new(),
            asset_dir: None,
            scratch_dir: None,
            template: None,
            release_delay_ms: DEFAULT_RELEASE_DELAY.as_millis() as u64,
            connect_timeout_secs: Some(10),
            io_timeout_secs: Some(60),
            compile_timeout_secs: Some(120),
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
            viewer: None,
        }
    }
}

impl PipelineConfig {
    /// Load `<home>/.invoicer/config.yaml`, falling back to defaults when the
    /// file does not exist. An unset `asset_dir` resolves to
    /// `<home>/.invoicer/assets`.
    pub fn load_at(home: &Path) -> Result<Self, RenderError> {
        let path = config_path(home);
        let mut config = if path.exists() {
            Self::load_file(&path)?
        } else {
            Self::default()
        };
        if config.asset_dir.is_none() {
            config.asset_dir = Some(assets_dir(home));
        }
        Ok(config)
    }

    /// `load_at` convenience wrapper using `dirs::home_dir()`.
    pub fn load() -> Result<Self, RenderError> {
        let home = dirs::home_dir().ok_or_else(|| RenderError::Config {
            path: PathBuf::from("~"),
            reason: "cannot determine home directory; set $HOME or equivalent".to_string(),
        })?;
        Self::load_at(&home)
    }

    /// Load an explicit config file. The file must exist.
    pub fn load_file(path: &Path) -> Result<Self, RenderError> {
        let raw = std::fs::read_to_string(path).map_err(|e| RenderError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&raw).map_err(|reason| RenderError::Config {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, String> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|e| e.to_string())
    }

    pub fn release_delay(&self) -> Duration {
        Duration::from_millis(self.release_delay_ms)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_secs.map(Duration::from_secs)
    }

    pub fn compile_timeout(&self) -> Option<Duration> {
        self.compile_timeout_secs.map(Duration::from_secs)
    }

    /// The asset directory, `./assets` when nothing resolved one.
    pub fn asset_dir(&self) -> PathBuf {
        self.asset_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::paths::ASSETS_DIR))
    }

    /// Preview program: configured value, else the platform opener.
    pub fn viewer(&self) -> String {
        self.viewer.clone().unwrap_or_else(|| {
            if cfg!(target_os = "macos") {
                "open".to_string()
            } else {
                "xdg-open".to_string()
            }
        })
    }
}
