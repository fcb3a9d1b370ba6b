//! `foundry clean` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::ProjectArgs;
use foundry::ops::errors::PipelineError;
use foundry::ops::foundry_clean::clean;
use foundry::util::shell::{Shell, Status};
use foundry::util::GlobalContext;

pub fn execute(args: ProjectArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let root = ctx.project_root(args.path.as_deref())?;
    let config = ctx
        .load_config(&root)
        .map_err(|source| PipelineError::Config { source })?;

    let removed = clean(&root, &config)?;
    if removed.is_empty() {
        shell.note("nothing to clean");
    }
    for dir in removed {
        shell.status(Status::Removed, dir.display());
    }
    Ok(())
}
