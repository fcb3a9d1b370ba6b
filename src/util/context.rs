//! Global context for Foundry operations.
//!
//! Provides centralized access to the working directory, project discovery
//! and configuration locations.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::platform::FIREBASE_JSON;
use crate::util::config::{global_config_path, load_config, Config, PROJECT_CONFIG_FILE};

/// Global context containing paths and environment.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Global configuration file, if the platform has a config directory
    global_config: Option<PathBuf>,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;

        Ok(GlobalContext {
            cwd,
            global_config: global_config_path(),
        })
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let mut ctx = Self::new()?;
        ctx.cwd = cwd;
        Ok(ctx)
    }

    /// Drop the global configuration file from the lookup.
    pub fn without_global_config(mut self) -> Self {
        self.global_config = None;
        self
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Resolve the project root.
    ///
    /// An explicit path is taken as-is (relative to cwd). Otherwise the
    /// nearest ancestor of cwd containing `firebase.json` is used.
    pub fn project_root(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            let root = self.cwd.join(path);
            if !root.is_dir() {
                bail!("project directory does not exist: {}", root.display());
            }
            return Ok(root);
        }

        let mut current = self.cwd.clone();
        loop {
            if current.join(FIREBASE_JSON).is_file() {
                return Ok(current);
            }
            if !current.pop() {
                bail!(
                    "could not find `{}` in {} or any parent directory",
                    FIREBASE_JSON,
                    self.cwd.display()
                );
            }
        }
    }

    /// Load the merged configuration for a project root.
    pub fn load_config(&self, project_root: &Path) -> Result<Config> {
        load_config(
            self.global_config.as_deref(),
            &project_root.join(PROJECT_CONFIG_FILE),
        )
    }
}
