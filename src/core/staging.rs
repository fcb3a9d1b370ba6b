//! The staging root: the single transient directory holding every subproject
//! of one run.
//!
//! Subprojects are materialized under `<project>/.foundry` (outside the
//! functions directory, so copying the functions directory never copies the
//! staging area into itself) and then relocated to `<functions>/.foundry`,
//! where module resolution from the subprojects still finds the project's
//! installed dependencies.
//!
//! [`StagingRoot`] owns both locations. It clears them when acquired and
//! removes them again when released or dropped, whichever comes first.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::util::fs::{move_dir, remove_dir_all_if_exists};

/// Directory name of the staging root in both locations.
pub const STAGING_DIR_NAME: &str = ".foundry";

/// Owned, single-use guard over the staging directories.
#[derive(Debug)]
pub struct StagingRoot {
    staging_dir: PathBuf,
    relocated_dir: PathBuf,
    relocated: bool,
    released: bool,
}

impl StagingRoot {
    /// Staging locations for a project, without touching the filesystem.
    pub fn locations(project_root: &Path, functions_dir: &Path) -> (PathBuf, PathBuf) {
        (
            project_root.join(STAGING_DIR_NAME),
            functions_dir.join(STAGING_DIR_NAME),
        )
    }

    /// Acquire the staging root, removing stale state from a previous run.
    pub fn acquire(project_root: &Path, functions_dir: &Path) -> Result<Self> {
        let (staging_dir, relocated_dir) = Self::locations(project_root, functions_dir);
        remove_dir_all_if_exists(&staging_dir)?;
        remove_dir_all_if_exists(&relocated_dir)?;

        Ok(StagingRoot {
            staging_dir,
            relocated_dir,
            relocated: false,
            released: false,
        })
    }

    /// Where subprojects are materialized.
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Where subprojects are processed after relocation.
    pub fn relocated_dir(&self) -> &Path {
        &self.relocated_dir
    }

    pub fn is_relocated(&self) -> bool {
        self.relocated
    }

    /// Move the staging root into the functions directory.
    pub fn relocate(&mut self) -> Result<()> {
        move_dir(&self.staging_dir, &self.relocated_dir)?;
        self.relocated = true;
        Ok(())
    }

    /// Remove both staging locations, reporting any failure.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        Self::remove_all(&self.staging_dir, &self.relocated_dir)
    }

    fn remove_all(staging_dir: &Path, relocated_dir: &Path) -> Result<()> {
        // Attempt both even if the first fails.
        let first = remove_dir_all_if_exists(staging_dir);
        let second = remove_dir_all_if_exists(relocated_dir);
        first.and(second)
    }
}

impl Drop for StagingRoot {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        if let Err(e) = Self::remove_all(&self.staging_dir, &self.relocated_dir) {
            tracing::warn!("failed to clean up staging directories: {:#}", e);
        }
    }
}
