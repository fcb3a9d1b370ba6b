//! A Firebase project with a functions codebase.

use std::path::{Path, PathBuf};

use crate::core::manifest::{PackageManifest, PACKAGE_JSON};
use crate::core::platform::{FirebaseConfig, FirebaseRc, FIREBASERC, FIREBASE_JSON};
use crate::ops::errors::PipelineError;
use crate::util::config::Config;
use crate::util::diagnostic::suggestions;

/// Default functions directory when nothing else is configured.
pub const DEFAULT_FUNCTIONS_DIR: &str = "functions";

/// Functions directory relative to the project root: configured, else
/// declared in `firebase.json`, else [`DEFAULT_FUNCTIONS_DIR`].
pub fn functions_source<'a>(config: &'a Config, firebase: Option<&'a FirebaseConfig>) -> &'a str {
    config
        .functions
        .source
        .as_deref()
        .or_else(|| firebase.and_then(FirebaseConfig::functions_source))
        .unwrap_or(DEFAULT_FUNCTIONS_DIR)
}

/// A resolved functions project.
#[derive(Debug, Clone)]
pub struct FunctionsProject {
    root: PathBuf,
    functions_dir: PathBuf,
    firebase: FirebaseConfig,
    project_id: String,
}

impl FunctionsProject {
    /// Resolve the project at `root`.
    ///
    /// `project` overrides the active project; it may be an alias from
    /// `.firebaserc` or a literal project id.
    pub fn open(root: &Path, config: &Config, project: Option<&str>) -> Result<Self, PipelineError> {
        let firebase_path = root.join(FIREBASE_JSON);
        if !firebase_path.is_file() {
            return Err(PipelineError::discovery(format!(
                "cannot find `{}` in {}",
                FIREBASE_JSON,
                root.display()
            )));
        }
        let firebase = FirebaseConfig::load(&firebase_path).map_err(|e| {
            PipelineError::discovery(format!("cannot read `{}`", FIREBASE_JSON)).with_source(e)
        })?;

        if firebase.codebases() > 1 {
            return Err(PipelineError::discovery(format!(
                "`{}` declares {} functions codebases; only one is supported",
                FIREBASE_JSON,
                firebase.codebases()
            ))
            .with_suggestion(suggestions::SINGLE_CODEBASE));
        }

        let source = functions_source(config, Some(&firebase));
        let functions_dir = root.join(source);
        if !functions_dir.is_dir() {
            return Err(PipelineError::discovery(format!(
                "cannot find \"{}\" directory",
                source
            ))
            .with_suggestion(suggestions::NO_FUNCTIONS_DIR));
        }

        let rc = FirebaseRc::load_or_default(&root.join(FIREBASERC)).map_err(|e| {
            PipelineError::discovery(format!("cannot read `{}`", FIREBASERC)).with_source(e)
        })?;
        let project_id = match project {
            Some(name) => rc.resolve(name).to_string(),
            None => rc
                .default_project()
                .map(str::to_string)
                .ok_or_else(|| {
                    PipelineError::discovery("no active Firebase project")
                        .with_suggestion(suggestions::NO_ACTIVE_PROJECT)
                })?,
        };

        Ok(FunctionsProject {
            root: root.to_path_buf(),
            functions_dir,
            firebase,
            project_id,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn functions_dir(&self) -> &Path {
        &self.functions_dir
    }

    pub fn firebase(&self) -> &FirebaseConfig {
        &self.firebase
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.functions_dir.join(PACKAGE_JSON)
    }

    /// Load the functions package manifest.
    pub fn load_manifest(&self) -> Result<PackageManifest, PipelineError> {
        let path = self.manifest_path();
        PackageManifest::load(&path)
            .map_err(|e| PipelineError::filesystem(format!("cannot load {}", path.display()), e))
    }
}
