use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.yaml";
pub const ASSETS_DIR: &str = "assets";

pub const DEFAULT_SERVER: &str = "localhost:7714";
pub const DEFAULT_COMPILER: &str = "xelatex";
pub const DEFAULT_RELEASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_ARTIFACT_BYTES: u64 = 64 * 1024 * 1024;

/// Fixed name of the source file written into a working area.
pub const SOURCE_FILE: &str = "render.tex";
/// Artifact the compiler leaves next to [`SOURCE_FILE`].
pub const ARTIFACT_FILE: &str = "render.pdf";
pub const WORKING_AREA_PREFIX: &str = "invoicer-";

/// Auxiliary files the compiler needs, relative to the asset directory.
/// Staged into every working area under the same relative path.
pub const ASSET_MANIFEST: &[&str] = &[
    "Fonts/FontAwesome.otf",
    "Fonts/OpenSans-Bold.ttf",
    "Fonts/OpenSans-Italic.ttf",
    "Fonts/OpenSans-LightItalic.ttf",
    "Fonts/OpenSans-Regular.ttf",
    "dapper-invoice.cls",
];

pub fn invoicer_root(home: &Path) -> PathBuf {
    home.join(".invoicer")
}

pub fn config_path(home: &Path) -> PathBuf {
    invoicer_root(home).join(CONFIG_FILE)
}

pub fn assets_dir(home: &Path) -> PathBuf {
    invoicer_root(home).join(ASSETS_DIR)
}
