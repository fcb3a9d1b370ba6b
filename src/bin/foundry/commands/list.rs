//! `foundry list` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::ProjectArgs;
use crate::commands::open_project;
use foundry::ops::foundry_list::{format_triggers, list_functions};
use foundry::ops::pipeline::{PipelineSettings, Toolkit};
use foundry::util::shell::Shell;

pub fn execute(args: ProjectArgs, shell: &Arc<Shell>) -> Result<()> {
    let (project, config) = open_project(&args)?;
    let settings = PipelineSettings::from_config(&config)?;
    let toolkit = Toolkit::native(&config);

    let triggers = list_functions(&project, &settings, &toolkit, shell)?;

    if shell.is_json() {
        for trigger in &triggers {
            shell.json_event(&serde_json::json!({
                "reason": "function",
                "function": trigger,
            }));
        }
    } else {
        print!("{}", format_triggers(&triggers));
    }
    Ok(())
}
