//! Package - a manifest plus the directory it was loaded from.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::manifest::{Manifest, PackageKind, MANIFEST_NAME};
use crate::core::PackageId;

/// A package found on disk.
#[derive(Debug, Clone)]
pub struct Package {
    /// The package ID
    package_id: PackageId,

    /// The parsed manifest
    manifest: Manifest,

    /// Root directory of the package
    root: PathBuf,
}

impl Package {
    /// Create a package from a manifest and root directory.
    pub fn new(manifest: Manifest, root: PathBuf) -> Self {
        let package_id = PackageId::new(&manifest.package.name);

        Package {
            package_id,
            manifest,
            root,
        }
    }

    /// Load a package from a manifest file.
    pub fn load(manifest_path: &Path) -> Result<Self> {
        let manifest = Manifest::load(manifest_path)?;
        let root = manifest_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();
        Ok(Self::new(manifest, root))
    }

    /// Get the package ID.
    pub fn package_id(&self) -> &PackageId {
        &self.package_id
    }

    /// Get the full qualified name.
    pub fn full_name(&self) -> &str {
        self.package_id.full_name()
    }

    /// Get the package type.
    pub fn kind(&self) -> PackageKind {
        self.manifest.package.kind
    }

    /// Get the manifest.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Get the package root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the manifest file path.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_NAME)
    }

    /// Configuration files whose modification invalidates every object
    /// compiled in a build that includes this package.
    pub fn cfg_filenames(&self) -> Vec<PathBuf> {
        vec![self.manifest_path()]
    }

    /// Explicit source roots declared in the manifest, made absolute.
    pub fn source_directories(&self) -> Vec<PathBuf> {
        self.manifest
            .package
            .src_dirs
            .iter()
            .map(|dir| self.root.join(dir))
            .collect()
    }
}
