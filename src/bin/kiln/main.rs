//! Kiln CLI - a build orchestrator for embedded firmware

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use kiln::util::GlobalContext;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("kiln=debug")
    } else {
        EnvFilter::new("kiln=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let mut ctx = GlobalContext::new()?;
    ctx.configure(cli.verbosity(), cli.color, cli.timeout);

    match cli.command {
        Commands::Build(args) => commands::build::execute(&ctx, args),
        Commands::Test(args) => commands::test::execute(&ctx, args),
        Commands::Clean(args) => commands::clean::execute(&ctx, args),
    }
}
