//! Global context for Kiln operations.
//!
//! Provides centralized access to configuration, paths, and console output.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::core::{find_project_root, Project, PROJECT_MANIFEST_NAME};
use crate::util::config::{global_config_path, load_config, project_config_path, Config};
use crate::util::shell::{ColorChoice, Shell, Verbosity};

#[derive(Debug, Clone)]
pub struct GlobalContext {
    cwd: PathBuf,

    /// Root of the enclosing project, if any
    project_root: Option<PathBuf>,

    config: Config,

    shell: Arc<Shell>,
}

impl GlobalContext {
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a context rooted at `cwd`, loading global and project config.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        let project_root = find_project_root(&cwd);
        let project_config = project_root.as_deref().map(project_config_path);
        let config = load_config(global_config_path().as_deref(), project_config.as_deref());

        let shell = Arc::new(Shell::new(
            config.build.verbosity.unwrap_or_default(),
            config.build.color.unwrap_or_default(),
        ));

        GlobalContext {
            cwd,
            project_root,
            config,
            shell,
        }
    }

    /// Apply command-line overrides on top of the loaded configuration.
    pub fn configure(
        &mut self,
        verbosity: Option<Verbosity>,
        color: Option<ColorChoice>,
        timeout_secs: Option<u64>,
    ) {
        if timeout_secs.is_some() {
            self.config.build.timeout_secs = timeout_secs;
        }

        let verbosity = verbosity
            .or(self.config.build.verbosity)
            .unwrap_or_default();
        let color = color.or(self.config.build.color).unwrap_or_default();
        self.shell = Arc::new(Shell::new(verbosity, color));
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shell(&self) -> &Arc<Shell> {
        &self.shell
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.config.timeout()
    }

    /// Root of the enclosing project.
    pub fn project_root(&self) -> Result<&Path> {
        self.project_root.as_deref().with_context(|| {
            format!(
                "could not find `{}` in `{}` or any parent directory",
                PROJECT_MANIFEST_NAME,
                self.cwd.display()
            )
        })
    }

    /// Load the enclosing project and all its packages.
    pub fn load_project(&self) -> Result<Project> {
        Project::load(self.project_root()?)
    }
}
