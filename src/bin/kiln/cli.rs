//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};

use kiln::util::{ColorChoice, Verbosity};

/// Kiln - a build orchestrator for embedded firmware projects
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Print every message, including per-package progress
    #[arg(short, long, global = true, conflicts_with_all = ["quiet", "silent"])]
    pub verbose: bool,

    /// Print warnings and errors only
    #[arg(short, long, global = true, conflicts_with = "silent")]
    pub quiet: bool,

    /// Print nothing
    #[arg(short, long, global = true)]
    pub silent: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, value_name = "WHEN")]
    pub color: Option<ColorChoice>,

    /// Kill any compiler, linker or test process running longer than this
    #[arg(long, global = true, value_name = "SECS", env = "KILN_TIMEOUT")]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Verbosity requested on the command line, if any.
    pub fn verbosity(&self) -> Option<Verbosity> {
        if self.silent {
            Some(Verbosity::Silent)
        } else if self.quiet {
            Some(Verbosity::Quiet)
        } else if self.verbose {
            Some(Verbosity::Verbose)
        } else {
            None
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the application of one or more targets
    Build(BuildArgs),

    /// Build and run package self tests
    Test(TestArgs),

    /// Remove build output
    Clean(CleanArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Targets to build
    #[arg(required = true)]
    pub targets: Vec<String>,
}

#[derive(Args)]
pub struct TestArgs {
    /// Packages to test, or `all` for every package with a `src/test` directory
    #[arg(required = true)]
    pub packages: Vec<String>,

    /// Target providing the BSP and compiler
    #[arg(long, default_value = kiln::ops::kiln_test::DEFAULT_TEST_TARGET)]
    pub target: String,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Targets to clean, or `all` to remove every build
    #[arg(required = true)]
    pub targets: Vec<String>,
}
