//! Machine-readable progress events for `--message-format json`.

use serde::Serialize;

use crate::core::SubprojectState;
use crate::ops::pipeline::DeploymentRecord;

/// One line of JSON output, tagged by `reason`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum DeployEvent<'a> {
    SubprojectStarted {
        function: &'a str,
        index: usize,
        total: usize,
    },
    StageFinished {
        function: &'a str,
        state: SubprojectState,
        elapsed_ms: u64,
    },
    FunctionDeployed {
        record: &'a DeploymentRecord,
    },
    SubprojectFailed {
        function: &'a str,
        state: SubprojectState,
        message: String,
    },
    RunFinished {
        success: bool,
        deployed: usize,
    },
}
