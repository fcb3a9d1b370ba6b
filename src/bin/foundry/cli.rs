//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell as CompletionShell;

use foundry::util::shell::ColorChoice;

/// Foundry - deploy every Firebase function as its own minimal package
#[derive(Parser)]
#[command(name = "foundry")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Print errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    /// Output format for progress messages
    #[arg(long, global = true, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy functions, each as an isolated and pruned subproject
    Deploy(DeployArgs),

    /// List the functions discovered in the project
    List(ProjectArgs),

    /// Remove staging directories left by an interrupted deploy
    Clean(ProjectArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct ProjectArgs {
    /// Project directory (defaults to the nearest directory with firebase.json)
    #[arg(long, env = "FOUNDRY_PROJECT_DIR")]
    pub path: Option<PathBuf>,

    /// Firebase project id or alias (defaults to the active project)
    #[arg(long)]
    pub project: Option<String>,
}

#[derive(Args)]
pub struct DeployArgs {
    /// Functions to deploy, space or comma separated (defaults to all)
    #[arg(value_name = "FUNCTIONS", value_delimiter = ',')]
    pub functions: Vec<String>,

    #[command(flatten)]
    pub project: ProjectArgs,

    /// Pass --debug to the deploy tool
    #[arg(long)]
    pub debug: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: CompletionShell,
}
