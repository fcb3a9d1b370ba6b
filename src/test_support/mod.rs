//! Test utilities and mocks for Foundry unit tests.
//!
//! This module provides a scripted [`CommandRunner`], fake analysis engines
//! with failure injection, and on-disk project fixtures.
//!
//! # Example
//!
//! ```rust,ignore
//! use foundry::test_support::{CommandPattern, FunctionsFixture, MockRunner};
//!
//! #[test]
//! fn test_example() {
//!     let fixture = FunctionsFixture::standard();
//!     let runner = MockRunner::new().fail_on(CommandPattern::program("npm"), 2, "tsc failed");
//!
//!     // Use the runner and fixture in tests...
//! }
//! ```

pub mod fixtures;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};

use crate::analysis::{
    DeadCodeEliminator, EntryPointIsolator, IsolationReport, TriggerDiscovery,
    UnusedDependencies, UsageDetector,
};
use crate::core::{SubprojectState, Trigger, TriggerKind};
use crate::ops::pipeline::Toolkit;
use crate::util::process::{CommandRunner, ProcessBuilder, ProcessOutcome};

// Re-export fixtures for convenience
pub use fixtures::*;

/// Pattern for matching commands in [`MockRunner`].
#[derive(Debug, Clone)]
pub enum CommandPattern {
    /// Match on the program name.
    Program(String),
    /// Match if any argument equals the string.
    Arg(String),
    /// Match if the displayed command line contains the substring.
    Contains(String),
    /// Match if the working directory contains the substring.
    InDir(String),
    /// Match if every pattern matches.
    All(Vec<CommandPattern>),
}

impl CommandPattern {
    pub fn program(name: &str) -> Self {
        CommandPattern::Program(name.to_string())
    }

    pub fn arg(arg: &str) -> Self {
        CommandPattern::Arg(arg.to_string())
    }

    pub fn contains(substring: &str) -> Self {
        CommandPattern::Contains(substring.to_string())
    }

    pub fn in_dir(substring: &str) -> Self {
        CommandPattern::InDir(substring.to_string())
    }

    pub fn both(a: CommandPattern, b: CommandPattern) -> Self {
        CommandPattern::All(vec![a, b])
    }

    /// Check if this pattern matches the given command.
    pub fn matches(&self, cmd: &ProcessBuilder) -> bool {
        match self {
            CommandPattern::Program(name) => cmd.get_program() == Path::new(name),
            CommandPattern::Arg(arg) => cmd.get_args().iter().any(|a| a == arg),
            CommandPattern::Contains(s) => cmd.display_command().contains(s.as_str()),
            CommandPattern::InDir(s) => cmd
                .get_cwd()
                .map(|cwd| cwd.to_string_lossy().contains(s.as_str()))
                .unwrap_or(false),
            CommandPattern::All(patterns) => patterns.iter().all(|p| p.matches(cmd)),
        }
    }
}

/// A command seen by a [`MockRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Displayed command line.
    pub command: String,
    pub cwd: Option<PathBuf>,
}

/// Shared record of commands, readable after the runner has been boxed.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<RecordedCall>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, call: RecordedCall) {
        self.0.lock().unwrap().push(call);
    }
}

/// Mock command runner.
///
/// Every command succeeds with empty output unless a failure rule matches.
/// All commands are recorded.
#[derive(Debug, Default)]
pub struct MockRunner {
    failures: Vec<(CommandPattern, ProcessOutcome)>,
    log: CallLog,
}

impl MockRunner {
    pub fn new() -> Self {
        MockRunner::default()
    }

    /// Make matching commands exit with `code` and `stderr`.
    pub fn fail_on(mut self, pattern: CommandPattern, code: i32, stderr: &str) -> Self {
        self.failures.push((
            pattern,
            ProcessOutcome {
                exit_code: Some(code),
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        ));
        self
    }

    /// Get all commands that were run.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.log.calls()
    }

    /// Handle on the call record.
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, cmd: &ProcessBuilder) -> Result<ProcessOutcome> {
        self.log.push(RecordedCall {
            command: cmd.display_command(),
            cwd: cmd.get_cwd().map(Path::to_path_buf),
        });

        let outcome = self
            .failures
            .iter()
            .find(|(pattern, _)| pattern.matches(cmd))
            .map(|(_, outcome)| outcome.clone())
            .unwrap_or_else(|| ProcessOutcome {
                exit_code: Some(0),
                ..Default::default()
            });
        Ok(outcome)
    }
}

/// Where fake collaborators should fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailAt {
    Never,
    /// Fail every subproject while moving into this state.
    State(SubprojectState),
    /// Fail only the named function while moving into this state.
    Function(String, SubprojectState),
}

impl FailAt {
    fn hits(&self, state: SubprojectState, function: &str) -> bool {
        match self {
            FailAt::Never => false,
            FailAt::State(s) => *s == state,
            FailAt::Function(name, s) => *s == state && name == function,
        }
    }

    /// Working directory fragment shared by the commands to fail.
    fn dir_fragment(&self) -> String {
        match self {
            FailAt::Function(name, _) => format!("{}-subproject", name),
            _ => "-subproject".to_string(),
        }
    }
}

/// Function name of the subproject a path belongs to.
fn subproject_of(path: &Path) -> String {
    path.components()
        .filter_map(|c| c.as_os_str().to_str())
        .find_map(|c| c.strip_suffix("-subproject"))
        .unwrap_or_default()
        .to_string()
}

/// What the fake collaborators observed.
#[derive(Debug, Clone, Default)]
pub struct ToolCalls {
    isolated: Arc<Mutex<Vec<String>>>,
    log: CallLog,
}

impl ToolCalls {
    /// Functions isolation was attempted for, in order.
    pub fn isolated(&self) -> Vec<String> {
        self.isolated.lock().unwrap().clone()
    }

    /// Number of build commands run.
    pub fn builds(&self) -> usize {
        self.log
            .calls()
            .iter()
            .filter(|c| c.command.starts_with("npm "))
            .count()
    }

    /// Deploy command lines, in order.
    pub fn deploys(&self) -> Vec<String> {
        self.log
            .calls()
            .into_iter()
            .filter(|c| c.command.contains(" deploy "))
            .map(|c| c.command)
            .collect()
    }
}

struct FakeDiscovery {
    names: Vec<String>,
}

impl TriggerDiscovery for FakeDiscovery {
    fn discover(&self, _functions_dir: &Path, project_id: &str) -> Result<Vec<Trigger>> {
        Ok(self
            .names
            .iter()
            .map(|name| {
                Trigger::new(name.as_str(), TriggerKind::Http).with_url(format!(
                    "https://us-central1-{}.cloudfunctions.net/{}",
                    project_id, name
                ))
            })
            .collect())
    }
}

struct FakeIsolator {
    fail: FailAt,
    seen: Arc<Mutex<Vec<String>>>,
}

impl EntryPointIsolator for FakeIsolator {
    fn isolate(&self, _root_file: &Path, symbol: &str) -> Result<IsolationReport> {
        self.seen.lock().unwrap().push(symbol.to_string());
        if self.fail.hits(SubprojectState::EntryIsolated, symbol) {
            bail!("injected isolation failure");
        }
        Ok(IsolationReport {
            passes: 1,
            converged: true,
        })
    }
}

struct FakeEliminator {
    fail: FailAt,
}

impl DeadCodeEliminator for FakeEliminator {
    fn eliminate(&self, _source_root: &Path, root_file: &Path) -> Result<usize> {
        if self
            .fail
            .hits(SubprojectState::DeadCodePruned, &subproject_of(root_file))
        {
            bail!("injected elimination failure");
        }
        Ok(0)
    }
}

struct FakeUsage {
    fail: FailAt,
}

impl UsageDetector for FakeUsage {
    fn detect_unused(&self, project_root: &Path) -> Result<UnusedDependencies> {
        let function = subproject_of(project_root);
        if self.fail.hits(SubprojectState::DependenciesPruned, &function) {
            bail!("injected usage failure");
        }
        if self.fail.hits(SubprojectState::ManifestWritten, &function) {
            // The manifest can no longer be written as a file.
            let manifest = project_root.join("package.json");
            std::fs::remove_file(&manifest)?;
            std::fs::create_dir(&manifest)?;
        }
        Ok(UnusedDependencies::default())
    }
}

/// A toolkit of fakes discovering `names`, failing as `fail` says.
///
/// Materialization is not a collaborator; see
/// [`FunctionsFixture::break_materialization`] for that state.
pub fn fake_toolkit(names: &[&str], fail: FailAt) -> (Toolkit, ToolCalls) {
    let mut runner = MockRunner::new();
    let dir = fail.dir_fragment();
    for state in [SubprojectState::Rebuilt, SubprojectState::Deployed] {
        let applies = match &fail {
            FailAt::State(s) | FailAt::Function(_, s) => *s == state,
            FailAt::Never => false,
        };
        if !applies {
            continue;
        }
        let command = if state == SubprojectState::Rebuilt {
            CommandPattern::program("npm")
        } else {
            CommandPattern::arg("deploy")
        };
        runner = runner.fail_on(
            CommandPattern::both(command, CommandPattern::in_dir(&dir)),
            1,
            "injected command failure",
        );
    }

    let calls = ToolCalls {
        isolated: Arc::default(),
        log: runner.log(),
    };
    let toolkit = Toolkit {
        discovery: Box::new(FakeDiscovery {
            names: names.iter().map(|s| s.to_string()).collect(),
        }),
        isolator: Box::new(FakeIsolator {
            fail: fail.clone(),
            seen: calls.isolated.clone(),
        }),
        eliminator: Box::new(FakeEliminator { fail: fail.clone() }),
        usage: Box::new(FakeUsage { fail }),
        runner: Box::new(runner),
    };
    (toolkit, calls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_runner_records_and_fails() {
        let runner = MockRunner::new().fail_on(CommandPattern::arg("deploy"), 3, "denied");

        let ok = runner
            .run(&ProcessBuilder::new("npm").args(["run", "build"]).cwd("/w"))
            .unwrap();
        assert!(ok.success());

        let failed = runner
            .run(&ProcessBuilder::new("firebase").arg("deploy"))
            .unwrap();
        assert_eq!(failed.exit_code, Some(3));
        assert_eq!(failed.stderr, "denied");

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].command, "npm run build");
        assert_eq!(calls[0].cwd.as_deref(), Some(Path::new("/w")));
    }

    #[test]
    fn test_combined_pattern() {
        let pattern = CommandPattern::both(
            CommandPattern::program("npm"),
            CommandPattern::in_dir("sendEmail-subproject"),
        );
        let cmd = ProcessBuilder::new("npm").cwd("/p/functions/.foundry/sendEmail-subproject/functions");
        assert!(pattern.matches(&cmd));
        assert!(!pattern.matches(&ProcessBuilder::new("npm").cwd("/p/functions")));
    }

    #[test]
    fn test_subproject_of() {
        assert_eq!(
            subproject_of(Path::new("/p/functions/.foundry/sendEmail-subproject/functions/src")),
            "sendEmail"
        );
        assert_eq!(subproject_of(Path::new("/p/functions")), "");
    }
}
