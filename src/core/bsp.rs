//! Board support packages.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::manifest::{BspSettings, Manifest};
use crate::core::{Package, PackageId};

/// Board-level settings read from a BSP package's `[bsp]` section.
#[derive(Debug, Clone)]
pub struct BspPackage {
    package_id: PackageId,
    root: PathBuf,
    manifest_path: PathBuf,

    /// Target architecture
    pub arch: String,

    /// Compiler package name, if declared
    pub compiler_name: Option<String>,

    /// Absolute path of the linker script, if declared
    pub linker_script: Option<PathBuf>,
}

impl BspPackage {
    /// Read board settings from a BSP package with no features applied.
    pub fn new(package: &Package) -> Result<Self> {
        let Some(settings) = package.manifest().bsp.as_ref() else {
            bail!("package `{}` has no [bsp] section", package.full_name());
        };

        let mut bsp = BspPackage {
            package_id: package.package_id().clone(),
            root: package.root().to_path_buf(),
            manifest_path: package.manifest_path(),
            arch: String::new(),
            compiler_name: None,
            linker_script: None,
        };
        bsp.apply(settings, &BTreeSet::new())?;
        Ok(bsp)
    }

    /// Re-read the BSP manifest, applying feature-gated overrides.
    ///
    /// Memory map and linker settings may depend on features that are only
    /// known once dependency resolution has converged.
    pub fn reload(&mut self, features: &BTreeSet<String>) -> Result<()> {
        let manifest = Manifest::load(&self.manifest_path)?;
        let settings = manifest
            .bsp
            .with_context(|| format!("package `{}` has no [bsp] section", self.package_id))?;
        self.apply(&settings, features)
    }

    fn apply(&mut self, settings: &BspSettings, features: &BTreeSet<String>) -> Result<()> {
        let Some(arch) = settings.arch.as_deref().filter(|a| !a.is_empty()) else {
            bail!("BSP `{}` does not specify an architecture", self.package_id);
        };

        self.arch = arch.to_string();
        self.compiler_name = settings.compiler.clone().filter(|c| !c.is_empty());
        self.linker_script = settings
            .linker_script_for(features)
            .map(|script| self.root.join(script));
        Ok(())
    }

    pub fn package_id(&self) -> &PackageId {
        &self.package_id
    }

    /// BSP package name.
    pub fn name(&self) -> &str {
        self.package_id.full_name()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
