//! Configuration file support for Foundry.
//!
//! Foundry reads two configuration files:
//! - Global: `config.toml` in the user configuration directory - user-wide defaults
//! - Project: `foundry.toml` next to `firebase.json` - project-specific overrides
//!
//! Project config takes precedence over global config, and command-line flags
//! take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the project-level configuration file.
pub const PROJECT_CONFIG_FILE: &str = "foundry.toml";

/// Default number of repair passes after entry-point isolation.
pub const DEFAULT_MAX_PASSES: usize = 10;

/// Foundry configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Functions project layout
    pub functions: FunctionsConfig,

    /// Build settings
    pub build: BuildConfig,

    /// Deploy settings
    pub deploy: DeployConfig,

    /// Entry-point isolation settings
    pub isolate: IsolateConfig,
}

/// Layout of the functions project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FunctionsConfig {
    /// Functions directory relative to the project root.
    /// Falls back to `functions.source` in firebase.json, then `functions`.
    pub source: Option<String>,

    /// Root source file, relative to the functions directory (default `src/index.ts`)
    pub entry: Option<String>,

    /// Source directory removed after a subproject build (default `src`)
    pub source_dir: Option<String>,

    /// Build output directory cleaned before a subproject build (default `lib`)
    pub output_dir: Option<String>,

    /// Extra globs excluded when materializing subprojects
    pub exclude: Vec<String>,
}

impl FunctionsConfig {
    pub fn entry(&self) -> &str {
        self.entry.as_deref().unwrap_or("src/index.ts")
    }

    pub fn source_dir(&self) -> &str {
        self.source_dir.as_deref().unwrap_or("src")
    }

    pub fn output_dir(&self) -> &str {
        self.output_dir.as_deref().unwrap_or("lib")
    }
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Build command as an argv list (default `npm run build`)
    pub command: Option<Vec<String>>,
}

impl BuildConfig {
    pub fn command(&self) -> Vec<String> {
        match &self.command {
            Some(cmd) if !cmd.is_empty() => cmd.clone(),
            _ => vec!["npm".to_string(), "run".to_string(), "build".to_string()],
        }
    }
}

/// Deploy-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DeployConfig {
    /// Deploy CLI program (default `firebase`)
    pub program: Option<String>,

    /// Region used to derive HTTP trigger URLs (default `us-central1`)
    pub region: Option<String>,
}

impl DeployConfig {
    pub fn program(&self) -> &str {
        self.program.as_deref().unwrap_or("firebase")
    }

    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or("us-central1")
    }
}

/// Entry-point isolation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IsolateConfig {
    /// Upper bound on import repair passes
    pub max_passes: usize,
}

impl Default for IsolateConfig {
    fn default() -> Self {
        IsolateConfig {
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.functions.source.is_some() {
            self.functions.source = other.functions.source;
        }
        if other.functions.entry.is_some() {
            self.functions.entry = other.functions.entry;
        }
        if other.functions.source_dir.is_some() {
            self.functions.source_dir = other.functions.source_dir;
        }
        if other.functions.output_dir.is_some() {
            self.functions.output_dir = other.functions.output_dir;
        }
        if !other.functions.exclude.is_empty() {
            self.functions.exclude = other.functions.exclude;
        }
        if other.build.command.is_some() {
            self.build.command = other.build.command;
        }
        if other.deploy.program.is_some() {
            self.deploy.program = other.deploy.program;
        }
        if other.deploy.region.is_some() {
            self.deploy.region = other.deploy.region;
        }
        if other.isolate != IsolateConfig::default() {
            self.isolate = other.isolate;
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (foundry.toml)
/// 2. Global config
/// 3. Defaults
///
/// A missing file is skipped; a malformed one is an error.
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            config.merge(Config::load(global_path)?);
        }
    }

    if project_path.exists() {
        config.merge(Config::load(project_path)?);
    }

    Ok(config)
}

/// Get the global configuration file path.
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "foundry", "foundry")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
