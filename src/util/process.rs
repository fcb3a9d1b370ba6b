//! Subprocess execution utilities.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result};

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    /// Create a builder from an argv list (`["npm", "run", "build"]`).
    ///
    /// Returns `None` for an empty list.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(ProcessBuilder::new(program).args(args))
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Get the working directory, if set.
    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    fn build_command(&self, program: &Path) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute the command and wait for completion, capturing its output.
    pub fn exec(&self) -> Result<Output> {
        let program = find_executable_in(&self.program, self.cwd.as_deref())
            .with_context(|| format!("`{}` not found in PATH", self.program.display()))?;

        let mut cmd = self.build_command(&program);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let output = child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))?;

        Ok(output)
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutcome {
    /// Exit code, `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutcome {
    /// Check whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl From<Output> for ProcessOutcome {
    fn from(output: Output) -> Self {
        ProcessOutcome {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Synchronous process execution seam.
///
/// The pipeline never spawns processes directly; it goes through a runner so
/// tests can record and script external commands.
pub trait CommandRunner {
    /// Run the command to completion. A non-zero exit is not an error here;
    /// callers inspect [`ProcessOutcome::exit_code`].
    fn run(&self, cmd: &ProcessBuilder) -> Result<ProcessOutcome>;
}

/// Runner that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &ProcessBuilder) -> Result<ProcessOutcome> {
        tracing::debug!(
            "running `{}` in {}",
            cmd.display_command(),
            cmd.get_cwd()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ".".to_string())
        );
        let output = cmd.exec()?;
        Ok(output.into())
    }
}

/// Resolve a program the way a shell would: bare names go through PATH,
/// relative paths are taken relative to `cwd`.
fn find_executable_in(program: &Path, cwd: Option<&Path>) -> Option<PathBuf> {
    if program.is_absolute() {
        return which::which(program).ok();
    }
    if program.components().count() > 1 {
        let base = cwd.map(Path::to_path_buf).unwrap_or_default();
        return which::which(base.join(program)).ok();
    }
    match cwd {
        Some(dir) => {
            let path = std::env::var_os("PATH");
            which::which_in(program, path, dir).ok()
        }
        None => which::which(program).ok(),
    }
}
