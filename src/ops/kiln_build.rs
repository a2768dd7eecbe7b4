//! Implementation of `kiln build`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::builder::Builder;
use crate::core::{Project, Target};
use crate::util::shell::Status;
use crate::util::GlobalContext;

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Targets to build, by full name or name under `targets/`
    pub targets: Vec<String>,
}

/// A linked application.
#[derive(Debug)]
pub struct Artifact {
    /// Target full name
    pub target: String,

    /// Path of the linked binary
    pub path: PathBuf,
}

/// Build every requested target in order, stopping at the first failure.
pub fn build(ctx: &GlobalContext, opts: &BuildOptions) -> Result<Vec<Artifact>> {
    if opts.targets.is_empty() {
        bail!("no targets specified");
    }

    let project = ctx.load_project()?;
    let mut artifacts = Vec::new();
    for name in &opts.targets {
        artifacts.push(build_target(ctx, &project, name)?);
    }
    Ok(artifacts)
}

fn build_target(ctx: &GlobalContext, project: &Project, name: &str) -> Result<Artifact> {
    let target = Target::find(project, name)?;
    let full_name = target.full_name().to_string();

    let span = ctx.shell().span(Status::Building, &full_name);
    let mut builder = Builder::new(project, target, ctx.shell().clone()).with_timeout(ctx.timeout());
    let path = builder
        .build()
        .with_context(|| format!("failed to build target `{}`", full_name))?;
    span.finish_with_message(format!(
        "{} ({})",
        full_name,
        path.strip_prefix(project.root()).unwrap_or(&path).display()
    ));

    Ok(Artifact {
        target: full_name,
        path,
    })
}
