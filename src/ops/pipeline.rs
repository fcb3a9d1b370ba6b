//! Per-subproject stage transitions.
//!
//! Each stage is a method on the subproject handle of the state it starts
//! from and consumes that handle, so a subproject can only move forward one
//! state at a time:
//!
//! ```text
//! isolate_entry -> eliminate_dead_code -> prune_dependencies
//!     -> write_manifest -> rebuild -> deploy
//! ```

use std::path::PathBuf;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use glob::Pattern;
use serde::Serialize;

use crate::analysis::{
    CompiledEntryDiscovery, DeadCodeEliminator, EntryPointIsolator, ImportGraphEliminator,
    ImportUsageDetector, IsolationReport, SourceIsolator, TriggerDiscovery, UsageDetector,
};
use crate::core::manifest::{PackageManifest, PACKAGE_JSON};
use crate::core::subproject::{state, Subproject, SubprojectState};
use crate::ops::errors::PipelineError;
use crate::ops::exec::{build_project, deploy_function};
use crate::ops::prune::{prune_manifest, PruneSummary};
use crate::util::config::Config;
use crate::util::fs::{compile_globs, remove_dir_all_if_exists};
use crate::util::process::{CommandRunner, SystemRunner};

/// The collaborators a run is driven with.
pub struct Toolkit {
    pub discovery: Box<dyn TriggerDiscovery>,
    pub isolator: Box<dyn EntryPointIsolator>,
    pub eliminator: Box<dyn DeadCodeEliminator>,
    pub usage: Box<dyn UsageDetector>,
    pub runner: Box<dyn CommandRunner>,
}

impl Toolkit {
    /// Native analysis engines and real processes.
    pub fn native(config: &Config) -> Self {
        Toolkit {
            discovery: Box::new(CompiledEntryDiscovery::new(config.deploy.region())),
            isolator: Box::new(SourceIsolator::new(config.isolate.max_passes)),
            eliminator: Box::new(ImportGraphEliminator),
            usage: Box::new(ImportUsageDetector::new(config.functions.output_dir())),
            runner: Box::new(SystemRunner),
        }
    }
}

/// Resolved project layout and commands.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Root source file, relative to the functions directory.
    pub entry: PathBuf,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub build_command: Vec<String>,
    pub deploy_program: String,
    pub excludes: Vec<Pattern>,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let excludes = compile_globs(&config.functions.exclude)
            .map_err(|source| PipelineError::Config { source })?;

        Ok(PipelineSettings {
            entry: PathBuf::from(config.functions.entry()),
            source_dir: PathBuf::from(config.functions.source_dir()),
            output_dir: PathBuf::from(config.functions.output_dir()),
            build_command: config.build.command(),
            deploy_program: config.deploy.program().to_string(),
            excludes,
        })
    }
}

/// Where and how subprojects are deployed.
#[derive(Debug, Clone)]
pub struct DeployTarget {
    pub project_id: String,
    pub debug: bool,
    /// Commit of the project root, if it is a git checkout.
    pub commit: Option<String>,
}

/// One successful deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub function: String,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub deployed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl Subproject<state::Materialized> {
    /// Narrow the root file's exports to this subproject's function.
    pub fn isolate_entry(
        self,
        isolator: &dyn EntryPointIsolator,
        settings: &PipelineSettings,
    ) -> Result<(Subproject<state::EntryIsolated>, IsolationReport), PipelineError> {
        let root_file = self.working_dir().join(&settings.entry);
        let report = isolator
            .isolate(&root_file, self.entry_point())
            .map_err(|e| {
                PipelineError::analysis(self.entry_point(), SubprojectState::EntryIsolated, e)
            })?;

        Ok((self.advance(), report))
    }
}

impl Subproject<state::EntryIsolated> {
    /// Delete source files the isolated root no longer reaches.
    pub fn eliminate_dead_code(
        self,
        eliminator: &dyn DeadCodeEliminator,
        settings: &PipelineSettings,
    ) -> Result<(Subproject<state::DeadCodePruned>, usize), PipelineError> {
        let source_root = self.working_dir().join(&settings.source_dir);
        let root_file = self.working_dir().join(&settings.entry);
        let removed = eliminator
            .eliminate(&source_root, &root_file)
            .map_err(|e| {
                PipelineError::analysis(self.entry_point(), SubprojectState::DeadCodePruned, e)
            })?;

        Ok((self.advance(), removed))
    }
}

impl Subproject<state::DeadCodePruned> {
    /// Compute the manifest to ship from the original one.
    pub fn prune_dependencies(
        mut self,
        detector: &dyn UsageDetector,
        original: &PackageManifest,
    ) -> Result<(Subproject<state::DependenciesPruned>, PruneSummary), PipelineError> {
        let unused = detector.detect_unused(self.working_dir()).map_err(|e| {
            PipelineError::analysis(self.entry_point(), SubprojectState::DependenciesPruned, e)
        })?;

        let (manifest, summary) = prune_manifest(original, &unused);
        self.manifest = Some(manifest);
        Ok((self.advance(), summary))
    }
}

impl Subproject<state::DependenciesPruned> {
    /// Persist the pruned manifest into the subproject.
    pub fn write_manifest(self) -> Result<Subproject<state::ManifestWritten>, PipelineError> {
        let path = self.working_dir().join(PACKAGE_JSON);
        let manifest = self.manifest.as_ref().ok_or_else(|| {
            PipelineError::analysis(
                self.entry_point(),
                SubprojectState::ManifestWritten,
                anyhow!("no pruned manifest"),
            )
        })?;
        manifest
            .save(&path)
            .map_err(|e| PipelineError::filesystem(format!("cannot write {}", path.display()), e))?;

        Ok(self.advance())
    }
}

impl Subproject<state::ManifestWritten> {
    /// Build from the pruned sources, leaving only build output behind.
    pub fn rebuild(
        self,
        runner: &dyn CommandRunner,
        settings: &PipelineSettings,
    ) -> Result<Subproject<state::Rebuilt>, PipelineError> {
        let dir = self.working_dir();
        let output_dir = dir.join(&settings.output_dir);
        remove_dir_all_if_exists(&output_dir).map_err(|e| {
            PipelineError::filesystem(format!("cannot clean {}", output_dir.display()), e)
        })?;

        build_project(runner, &settings.build_command, dir)?;

        let source_dir = dir.join(&settings.source_dir);
        remove_dir_all_if_exists(&source_dir).map_err(|e| {
            PipelineError::filesystem(format!("cannot remove {}", source_dir.display()), e)
        })?;

        Ok(self.advance())
    }
}

impl Subproject<state::Rebuilt> {
    /// Deploy the function. The subproject is finished afterwards.
    pub fn deploy(
        self,
        runner: &dyn CommandRunner,
        settings: &PipelineSettings,
        target: &DeployTarget,
    ) -> Result<DeploymentRecord, PipelineError> {
        let deployed_at = deploy_function(
            runner,
            &settings.deploy_program,
            self.working_dir(),
            self.entry_point(),
            &target.project_id,
            target.debug,
        )?;

        Ok(DeploymentRecord {
            function: self.trigger.entry_point,
            project_id: target.project_id.clone(),
            url: self.trigger.url,
            deployed_at,
            commit: target.commit.clone(),
        })
    }
}
