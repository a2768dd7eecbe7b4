//! Project - the root directory and every package found beneath it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use walkdir::WalkDir;

use crate::core::manifest::MANIFEST_NAME;
use crate::core::{Package, PackageId};
use crate::util::fs::read_to_string;

/// Project manifest file name.
pub const PROJECT_MANIFEST_NAME: &str = "project.toml";

/// Name of the build output directory under the project root.
pub const BIN_DIR_NAME: &str = "bin";

/// Parsed `project.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectManifest {
    pub project: ProjectMetadata,
}

/// `[project]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,

    /// Directory names skipped during package discovery
    #[serde(default)]
    pub ignore: Vec<String>,
}

/// A project containing packages.
#[derive(Debug)]
pub struct Project {
    /// Project root directory
    root: PathBuf,

    /// Project name
    name: String,

    /// All packages, keyed by full name
    packages: BTreeMap<PackageId, Package>,
}

impl Project {
    /// Load a project from its root directory.
    pub fn load(root: &Path) -> Result<Self> {
        let manifest_path = root.join(PROJECT_MANIFEST_NAME);
        let contents = read_to_string(&manifest_path)?;
        let manifest: ProjectManifest = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", manifest_path.display()))?;

        let packages = discover_packages(root, &manifest.project.ignore)?;
        tracing::debug!(
            "Loaded project `{}` with {} packages",
            manifest.project.name,
            packages.len()
        );

        Ok(Project {
            root: root.to_path_buf(),
            name: manifest.project.name,
            packages,
        })
    }

    /// Get the project root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the project name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a package by full name.
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.get(&PackageId::new(name))
    }

    /// Look up a package by ID.
    pub fn package_by_id(&self, id: &PackageId) -> Option<&Package> {
        self.packages.get(id)
    }

    /// All packages in name order.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    /// Root of all build output.
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join(BIN_DIR_NAME)
    }
}

/// Walk the project tree and load every `pkg.toml`.
fn discover_packages(root: &Path, ignore: &[String]) -> Result<BTreeMap<PackageId, Package>> {
    let mut packages: BTreeMap<PackageId, Package> = BTreeMap::new();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !(name.starts_with('.') || name == BIN_DIR_NAME || ignore.iter().any(|i| *i == name))
        });

    for entry in walker {
        let entry = entry.context("failed to scan project directory")?;
        if !entry.file_type().is_file() || entry.file_name() != MANIFEST_NAME {
            continue;
        }

        let package = Package::load(entry.path())?;
        if let Some(existing) = packages.get(package.package_id()) {
            bail!(
                "duplicate package `{}`: {} and {}",
                package.full_name(),
                existing.root().display(),
                package.root().display()
            );
        }
        packages.insert(package.package_id().clone(), package);
    }

    Ok(packages)
}

/// Search upward from `start` for a directory containing `project.toml`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(PROJECT_MANIFEST_NAME).is_file() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}
