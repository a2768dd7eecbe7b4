//! `kiln clean` command

use anyhow::Result;

use crate::cli::CleanArgs;
use kiln::ops::kiln_clean::{clean, CleanOptions};
use kiln::util::GlobalContext;

pub fn execute(ctx: &GlobalContext, args: CleanArgs) -> Result<()> {
    clean(
        ctx,
        &CleanOptions {
            targets: args.targets,
        },
    )
}
