//! Static-analysis collaborators.
//!
//! The pipeline consumes these engines only through the traits below, so any
//! engine with equivalent semantics can be substituted. The native engines in
//! the submodules work directly on TypeScript/JavaScript source text.

pub mod imports;
pub mod isolate;
pub mod reachability;
pub mod triggers;
pub mod usage;

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;

use crate::core::Trigger;

pub use isolate::SourceIsolator;
pub use reachability::ImportGraphEliminator;
pub use triggers::CompiledEntryDiscovery;
pub use usage::ImportUsageDetector;

/// Discovers the deployable functions of a built project.
pub trait TriggerDiscovery {
    /// Triggers in discovery order. Fails if the build output cannot be
    /// introspected.
    fn discover(&self, functions_dir: &Path, project_id: &str) -> Result<Vec<Trigger>>;
}

/// Outcome of entry-point isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsolationReport {
    /// Repair passes run.
    pub passes: usize,
    /// Whether the last pass made no change.
    pub converged: bool,
}

/// Narrows a source file's exports to one symbol, in place.
pub trait EntryPointIsolator {
    /// Must be idempotent for the same symbol. A report with
    /// `converged == false` is best effort, not an error.
    fn isolate(&self, root_file: &Path, symbol: &str) -> Result<IsolationReport>;
}

/// Deletes source files unreachable from a root file.
pub trait DeadCodeEliminator {
    /// Returns the number of files removed. Never removes `root_file`.
    fn eliminate(&self, source_root: &Path, root_file: &Path) -> Result<usize>;
}

/// Declared dependency names without detected static usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnusedDependencies {
    pub dependencies: BTreeSet<String>,
    pub dev_dependencies: BTreeSet<String>,
}

/// Finds declared dependencies that no source file uses.
///
/// Dependencies used only dynamically (computed `require` arguments and the
/// like) are indistinguishable from unused ones and are reported as unused.
pub trait UsageDetector {
    fn detect_unused(&self, project_root: &Path) -> Result<UnusedDependencies>;
}
