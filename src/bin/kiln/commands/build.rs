//! `kiln build` command

use anyhow::Result;

use crate::cli::BuildArgs;
use kiln::ops::kiln_build::{build, BuildOptions};
use kiln::util::GlobalContext;

pub fn execute(ctx: &GlobalContext, args: BuildArgs) -> Result<()> {
    let opts = BuildOptions {
        targets: args.targets,
    };

    let artifacts = build(ctx, &opts)?;
    for artifact in &artifacts {
        tracing::debug!("{} -> {}", artifact.target, artifact.path.display());
    }

    Ok(())
}
