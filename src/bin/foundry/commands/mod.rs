//! Command implementations

pub mod clean;
pub mod completions;
pub mod deploy;
pub mod list;

use anyhow::Result;

use crate::cli::ProjectArgs;
use foundry::core::FunctionsProject;
use foundry::ops::errors::PipelineError;
use foundry::util::config::Config;
use foundry::util::GlobalContext;

/// Resolve the project and its merged configuration.
pub fn open_project(args: &ProjectArgs) -> Result<(FunctionsProject, Config)> {
    let ctx = GlobalContext::new()?;
    let root = ctx.project_root(args.path.as_deref())?;
    let config = ctx
        .load_config(&root)
        .map_err(|source| PipelineError::Config { source })?;
    let project = FunctionsProject::open(&root, &config, args.project.as_deref())?;
    Ok((project, config))
}
