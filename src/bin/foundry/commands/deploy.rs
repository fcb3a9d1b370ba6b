//! `foundry deploy` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::DeployArgs;
use crate::commands::open_project;
use foundry::ops::foundry_deploy::{deploy, DeployOptions};
use foundry::ops::pipeline::{PipelineSettings, Toolkit};
use foundry::util::shell::{format_duration, Shell, Status};

pub fn execute(args: DeployArgs, shell: &Arc<Shell>) -> Result<()> {
    let (project, config) = open_project(&args.project)?;
    let settings = PipelineSettings::from_config(&config)?;
    let toolkit = Toolkit::native(&config);

    let opts = DeployOptions {
        functions: args
            .functions
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect(),
        debug: args.debug,
    };

    let started = std::time::Instant::now();
    let report = deploy(&project, &settings, &toolkit, shell, &opts)?;

    shell.status(
        Status::Finished,
        format!(
            "deployed {} function(s) in {}",
            report.records.len(),
            format_duration(started.elapsed())
        ),
    );
    Ok(())
}
