//! Build and deploy command execution.

use std::path::Path;

use anyhow::anyhow;
use chrono::{DateTime, Utc};

use crate::ops::errors::PipelineError;
use crate::util::process::{CommandRunner, ProcessBuilder};

/// Run the build command in `dir`.
pub fn build_project(
    runner: &dyn CommandRunner,
    command: &[String],
    dir: &Path,
) -> Result<(), PipelineError> {
    let cmd = ProcessBuilder::from_argv(command)
        .ok_or_else(|| PipelineError::Config {
            source: anyhow!("build command is empty"),
        })?
        .cwd(dir);

    let outcome = runner.run(&cmd).map_err(|e| PipelineError::Build {
        dir: dir.to_path_buf(),
        exit_code: None,
        stderr: format!("{:#}", e),
    })?;

    if !outcome.success() {
        return Err(PipelineError::Build {
            dir: dir.to_path_buf(),
            exit_code: outcome.exit_code,
            stderr: outcome.stderr,
        });
    }

    Ok(())
}

/// Command line deploying exactly one function.
pub fn deploy_command(
    program: &str,
    dir: &Path,
    function: &str,
    project_id: &str,
    debug: bool,
) -> ProcessBuilder {
    let mut cmd = ProcessBuilder::new(program).arg("deploy");
    if debug {
        cmd = cmd.arg("--debug");
    }
    let only = format!("functions:{}", function);
    cmd.args(["--project", project_id])
        .args(["--only", only.as_str()])
        .cwd(dir)
}

/// Deploy one function from `dir`, returning when the deploy was issued.
pub fn deploy_function(
    runner: &dyn CommandRunner,
    program: &str,
    dir: &Path,
    function: &str,
    project_id: &str,
    debug: bool,
) -> Result<DateTime<Utc>, PipelineError> {
    let cmd = deploy_command(program, dir, function, project_id, debug);
    let issued_at = Utc::now();

    let outcome = runner.run(&cmd).map_err(|e| PipelineError::Deploy {
        function: function.to_string(),
        exit_code: None,
        stderr: format!("{:#}", e),
    })?;

    if !outcome.success() {
        return Err(PipelineError::Deploy {
            function: function.to_string(),
            exit_code: outcome.exit_code,
            stderr: outcome.stderr,
        });
    }

    Ok(issued_at)
}
