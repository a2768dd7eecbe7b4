//! On-disk project fixtures.
//!
//! A `ProjectFixture` owns a temporary directory holding a `project.toml`
//! and any number of packages. Builder methods write files immediately, so
//! a fixture can be loaded at any point.

use std::path::Path;

use tempfile::TempDir;

use crate::core::{Project, MANIFEST_NAME, PROJECT_MANIFEST_NAME};

/// A temporary project directory.
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    /// Create an empty project named `fixture`.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        std::fs::write(
            dir.path().join(PROJECT_MANIFEST_NAME),
            "[project]\nname = \"fixture\"\n",
        )
        .expect("failed to write project manifest");
        ProjectFixture { dir }
    }

    /// Add a package.
    ///
    /// `package_extra` is appended to the `[package]` section and `body`
    /// follows it verbatim.
    pub fn package(self, name: &str, package_extra: &str, body: &str) -> Self {
        let mut manifest = format!("[package]\nname = \"{}\"\n", name);
        if !package_extra.is_empty() {
            manifest.push_str(package_extra);
            manifest.push('\n');
        }
        if !body.is_empty() {
            manifest.push('\n');
            manifest.push_str(body);
        }
        self.file(&format!("{}/{}", name, MANIFEST_NAME), &manifest)
    }

    /// Add a library package.
    pub fn lib(self, name: &str, body: &str) -> Self {
        self.package(name, "", body)
    }

    /// Add a BSP package. `extra` continues the `[bsp]` section.
    pub fn bsp(self, name: &str, arch: &str, compiler: &str, extra: &str) -> Self {
        let body = format!(
            "[bsp]\narch = \"{}\"\ncompiler = \"{}\"\n{}",
            arch, compiler, extra
        );
        self.package(name, "type = \"bsp\"", &body)
    }

    /// Add a compiler package with default settings.
    pub fn compiler(self, name: &str) -> Self {
        self.package(name, "type = \"compiler\"", "[compiler]\n")
    }

    /// Add a target package.
    pub fn target(self, name: &str, app: Option<&str>, bsp: Option<&str>) -> Self {
        let mut body = String::from("[target]\n");
        if let Some(app) = app {
            body.push_str(&format!("app = \"{}\"\n", app));
        }
        if let Some(bsp) = bsp {
            body.push_str(&format!("bsp = \"{}\"\n", bsp));
        }
        self.package(name, "type = \"target\"", &body)
    }

    /// Write a file relative to the project root.
    pub fn file(self, rel: &str, contents: &str) -> Self {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create fixture directory");
        }
        std::fs::write(&path, contents).expect("failed to write fixture file");
        self
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Load the project.
    pub fn load(&self) -> Project {
        Project::load(self.root()).expect("failed to load fixture project")
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}
