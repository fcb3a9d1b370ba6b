//! Implementation of `foundry clean`.
//!
//! Removes staging directories left behind by an interrupted run.

use std::path::{Path, PathBuf};

use crate::core::platform::{FirebaseConfig, FIREBASE_JSON};
use crate::core::project::functions_source;
use crate::core::staging::StagingRoot;
use crate::ops::errors::PipelineError;
use crate::util::config::Config;
use crate::util::fs::remove_dir_all_if_exists;

/// Remove both staging locations of the project at `root`.
///
/// Returns the directories that existed and were removed. An unreadable
/// `firebase.json` falls back to the default functions directory.
pub fn clean(root: &Path, config: &Config) -> Result<Vec<PathBuf>, PipelineError> {
    let firebase = FirebaseConfig::load(&root.join(FIREBASE_JSON)).ok();
    let functions_dir = root.join(functions_source(config, firebase.as_ref()));
    let (staging, relocated) = StagingRoot::locations(root, &functions_dir);

    let mut removed = Vec::new();
    for dir in [staging, relocated] {
        if !dir.exists() {
            continue;
        }
        remove_dir_all_if_exists(&dir).map_err(|e| {
            PipelineError::filesystem(format!("cannot remove {}", dir.display()), e)
        })?;
        tracing::debug!("removed {}", dir.display());
        removed.push(dir);
    }
    Ok(removed)
}
