//! Implementation of `foundry list`.

use std::sync::Arc;

use crate::core::{FunctionsProject, Trigger};
use crate::ops::errors::PipelineError;
use crate::ops::foundry_deploy::discover_triggers;
use crate::ops::pipeline::{PipelineSettings, Toolkit};
use crate::util::shell::Shell;

/// Build the project and return its deployable functions.
pub fn list_functions(
    project: &FunctionsProject,
    settings: &PipelineSettings,
    toolkit: &Toolkit,
    shell: &Arc<Shell>,
) -> Result<Vec<Trigger>, PipelineError> {
    discover_triggers(project, settings, toolkit, shell)
}

/// One line per trigger: name, kind and URL when known.
pub fn format_triggers(triggers: &[Trigger]) -> String {
    let width = triggers
        .iter()
        .map(|t| t.entry_point.len())
        .max()
        .unwrap_or(0);

    let mut output = String::new();
    for trigger in triggers {
        let line = format!(
            "{:<width$}  {:<9}  {}",
            trigger.entry_point,
            trigger.kind.to_string(),
            trigger.url.as_deref().unwrap_or("-"),
            width = width
        );
        output.push_str(line.trim_end());
        output.push('\n');
    }
    output
}
