//! JSON summary of a completed build.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::builder::errors::{BuildError, BuildResult};

/// File name of the summary inside the build root.
pub const BUILD_MANIFEST_NAME: &str = "manifest.json";

/// What a build produced and how it was configured.
#[derive(Debug, Clone, Serialize)]
pub struct BuildManifest {
    pub target: String,
    pub app: Option<String>,
    pub bsp: String,
    pub arch: String,
    pub build_profile: String,
    pub features: Vec<String>,
    pub packages: Vec<PackageEntry>,
    /// API name to providing package
    pub apis: BTreeMap<String, String>,
    pub output: PathBuf,
}

/// One package in the build.
#[derive(Debug, Clone, Serialize)]
pub struct PackageEntry {
    pub name: String,
    /// Archive produced for the package, absent when it had no sources
    pub archive: Option<PathBuf>,
    pub deps: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub apis: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub req_apis: Vec<String>,
}

impl BuildManifest {
    /// Write the summary as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> BuildResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| BuildError::config(format!("failed to serialize build manifest: {}", e)))?;
        std::fs::write(path, json + "\n")
            .map_err(|e| BuildError::filesystem("write", path, e))
    }
}
