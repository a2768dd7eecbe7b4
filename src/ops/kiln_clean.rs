//! Implementation of `kiln clean`.

use anyhow::{bail, Context, Result};

use crate::builder::Builder;
use crate::core::Target;
use crate::util::fs::remove_dir_all_if_exists;
use crate::util::shell::Status;
use crate::util::GlobalContext;

/// Removes every build.
pub const ALL_TARGETS: &str = "all";

/// Options for the clean command.
#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    /// Targets to clean, or `all`
    pub targets: Vec<String>,
}

/// Remove build output.
pub fn clean(ctx: &GlobalContext, opts: &CleanOptions) -> Result<()> {
    if opts.targets.is_empty() {
        bail!("no targets specified");
    }

    let project = ctx.load_project()?;

    if opts.targets.iter().any(|t| t == ALL_TARGETS) {
        let bin = project.bin_dir();
        if bin.exists() {
            remove_dir_all_if_exists(&bin)?;
            ctx.shell().status(Status::Removed, bin.display());
        }
        return Ok(());
    }

    for name in &opts.targets {
        let target = Target::find(&project, name)?;
        let builder = Builder::new(&project, target, ctx.shell().clone());
        builder
            .clean()
            .with_context(|| format!("failed to clean target `{}`", name))?;
    }
    Ok(())
}
