//! Foundry CLI - per-function tree-shaking deploys for Firebase

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use foundry::util::diagnostic::emit;
use foundry::util::Shell;
use foundry::PipelineError;

mod cli;
mod commands;

use cli::{Cli, Commands, MessageFormat};

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("foundry=debug")
    } else {
        EnvFilter::new("foundry=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let shell = Arc::new(Shell::from_flags(
        cli.quiet,
        cli.verbose,
        cli.color,
        cli.message_format == MessageFormat::Json,
    ));

    if let Err(e) = run(cli, &shell) {
        match e.downcast_ref::<PipelineError>() {
            Some(err) if !shell.is_json() => emit(&err.to_diagnostic(), shell.use_color()),
            _ => shell.error(format!("{:#}", e)),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli, shell: &Arc<Shell>) -> Result<()> {
    match cli.command {
        Commands::Deploy(args) => commands::deploy::execute(args, shell),
        Commands::List(args) => commands::list::execute(args, shell),
        Commands::Clean(args) => commands::clean::execute(args, shell),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
