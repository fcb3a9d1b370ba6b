//! Per-function subprojects and their typed lifecycle.
//!
//! A [`Subproject`] carries its lifecycle state in its type. Every pipeline
//! stage consumes the handle of the previous state and returns the next one,
//! so stages cannot be skipped or reordered:
//!
//! ```text
//! Materialized -> EntryIsolated -> DeadCodePruned -> DependenciesPruned
//!              -> ManifestWritten -> Rebuilt -> Deployed
//! ```
//!
//! The transitions themselves live in `ops::pipeline`.

use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::manifest::PackageManifest;
use crate::core::project::DEFAULT_FUNCTIONS_DIR;
use crate::core::trigger::Trigger;

/// Lifecycle states of one subproject, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubprojectState {
    Materialized,
    EntryIsolated,
    DeadCodePruned,
    DependenciesPruned,
    ManifestWritten,
    Rebuilt,
    Deployed,
}

impl SubprojectState {
    /// All states in pipeline order.
    pub const ALL: [SubprojectState; 7] = [
        SubprojectState::Materialized,
        SubprojectState::EntryIsolated,
        SubprojectState::DeadCodePruned,
        SubprojectState::DependenciesPruned,
        SubprojectState::ManifestWritten,
        SubprojectState::Rebuilt,
        SubprojectState::Deployed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubprojectState::Materialized => "materialized",
            SubprojectState::EntryIsolated => "entry-isolated",
            SubprojectState::DeadCodePruned => "dead-code-pruned",
            SubprojectState::DependenciesPruned => "dependencies-pruned",
            SubprojectState::ManifestWritten => "manifest-written",
            SubprojectState::Rebuilt => "rebuilt",
            SubprojectState::Deployed => "deployed",
        }
    }

    /// The state after this one, `None` once deployed.
    pub fn next(self) -> Option<SubprojectState> {
        let pos = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(pos + 1).copied()
    }
}

impl fmt::Display for SubprojectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-level lifecycle markers.
pub mod state {
    use super::SubprojectState;

    /// Implemented by every lifecycle marker.
    pub trait Stage {
        const STATE: SubprojectState;
    }

    macro_rules! stage {
        ($($name:ident),* $(,)?) => {
            $(
                #[derive(Debug)]
                pub struct $name;

                impl Stage for $name {
                    const STATE: SubprojectState = SubprojectState::$name;
                }
            )*
        };
    }

    stage!(
        Materialized,
        EntryIsolated,
        DeadCodePruned,
        DependenciesPruned,
        ManifestWritten,
        Rebuilt,
    );
}

/// Where a subproject lives, before and after the staging root is relocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubprojectPaths {
    /// `<project>/.foundry/<entry>-subproject`
    pub root_dir: PathBuf,
    /// `<root_dir>/functions`
    pub functions_dir: PathBuf,
    /// `<functions>/.foundry/<entry>-subproject`
    pub moved_root_dir: PathBuf,
    /// `<moved_root_dir>/functions`
    pub moved_functions_dir: PathBuf,
}

impl SubprojectPaths {
    /// Directory name of a subproject inside the staging root.
    pub fn dir_name(entry_point: &str) -> String {
        format!("{}-subproject", entry_point)
    }

    pub fn new(staging_dir: &Path, relocated_dir: &Path, entry_point: &str) -> Self {
        let name = Self::dir_name(entry_point);
        let root_dir = staging_dir.join(&name);
        let moved_root_dir = relocated_dir.join(&name);
        SubprojectPaths {
            functions_dir: root_dir.join(DEFAULT_FUNCTIONS_DIR),
            moved_functions_dir: moved_root_dir.join(DEFAULT_FUNCTIONS_DIR),
            root_dir,
            moved_root_dir,
        }
    }
}

/// The isolated working copy for one trigger, in lifecycle state `S`.
#[derive(Debug)]
pub struct Subproject<S> {
    pub(crate) trigger: Trigger,
    pub(crate) paths: SubprojectPaths,
    /// Manifest to ship, set once dependencies have been pruned.
    pub(crate) manifest: Option<PackageManifest>,
    pub(crate) _state: PhantomData<S>,
}

impl<S: state::Stage> Subproject<S> {
    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn entry_point(&self) -> &str {
        &self.trigger.entry_point
    }

    pub fn paths(&self) -> &SubprojectPaths {
        &self.paths
    }

    /// Working functions directory. Stages run against the relocated copy.
    pub fn working_dir(&self) -> &Path {
        &self.paths.moved_functions_dir
    }

    pub fn state(&self) -> SubprojectState {
        S::STATE
    }

    /// Move to the next lifecycle state, keeping all data.
    pub(crate) fn advance<T: state::Stage>(self) -> Subproject<T> {
        Subproject {
            trigger: self.trigger,
            paths: self.paths,
            manifest: self.manifest,
            _state: PhantomData,
        }
    }
}

impl Subproject<state::Materialized> {
    pub(crate) fn materialized(trigger: Trigger, paths: SubprojectPaths) -> Self {
        Subproject {
            trigger,
            paths,
            manifest: None,
            _state: PhantomData,
        }
    }
}
