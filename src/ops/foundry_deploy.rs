//! Implementation of `foundry deploy`.
//!
//! The run builds the monolithic project once, discovers its functions,
//! validates the requested names, materializes one subproject per function
//! and then drives each subproject through every stage before starting the
//! next. Staging directories are removed on every exit path.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::core::staging::StagingRoot;
use crate::core::subproject::{state, Subproject, SubprojectState};
use crate::core::trigger::select_triggers;
use crate::core::{FunctionsProject, PackageManifest, Trigger};
use crate::ops::errors::PipelineError;
use crate::ops::events::DeployEvent;
use crate::ops::exec::build_project;
use crate::ops::materialize::create_subproject;
use crate::ops::pipeline::{DeployTarget, DeploymentRecord, PipelineSettings, Toolkit};
use crate::util::diagnostic::suggestions;
use crate::util::shell::{Shell, Span, Status};
use crate::util::vcs::head_commit;

/// Options for the deploy command.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Functions to deploy (empty = all discovered)
    pub functions: Vec<String>,

    /// Pass `--debug` to the deploy command
    pub debug: bool,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    /// Deployments in the order they happened.
    pub records: Vec<DeploymentRecord>,
    /// Subprojects driven to completion.
    pub processed: usize,
}

/// Top-level run states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Discovering,
    Validating,
    Materializing,
    ProcessingSubprojects,
    CleaningUp,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Discovering => "discovering",
            RunState::Validating => "validating",
            RunState::Materializing => "materializing",
            RunState::ProcessingSubprojects => "processing subprojects",
            RunState::CleaningUp => "cleaning up",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Build the project and discover its triggers.
pub fn discover_triggers(
    project: &FunctionsProject,
    settings: &PipelineSettings,
    toolkit: &Toolkit,
    shell: &Arc<Shell>,
) -> Result<Vec<Trigger>, PipelineError> {
    let span = shell.span(Status::Building, "functions project");
    build_project(
        toolkit.runner.as_ref(),
        &settings.build_command,
        project.functions_dir(),
    )?;
    span.finish_with_message("building functions project");

    let span = shell.span(Status::Analyzing, "build output");
    let triggers = toolkit
        .discovery
        .discover(project.functions_dir(), project.project_id())
        .map_err(|e| {
            PipelineError::discovery("cannot analyze the build output")
                .with_source(e)
                .with_suggestion(suggestions::INSTALL_MODULES)
        })?;
    span.finish_with_message(format!("analysis, {} function(s) found", triggers.len()));

    Ok(triggers)
}

/// Deploy every requested function of `project` as its own minimized subproject.
pub fn deploy(
    project: &FunctionsProject,
    settings: &PipelineSettings,
    toolkit: &Toolkit,
    shell: &Arc<Shell>,
    opts: &DeployOptions,
) -> Result<DeployReport, PipelineError> {
    shell.note(format!(
        "deploying optimized functions from {} to project `{}`",
        project.root().display(),
        project.project_id()
    ));

    let mut run = Run {
        project,
        settings,
        toolkit,
        shell,
        opts,
        state: RunState::Discovering,
        records: Vec::new(),
    };
    let outcome = run.execute();

    let success = outcome.is_ok();
    run.enter(if success { RunState::Done } else { RunState::Failed });
    shell.json_event(&DeployEvent::RunFinished {
        success,
        deployed: run.records.len(),
    });

    let processed = outcome?;
    Ok(DeployReport {
        records: run.records,
        processed,
    })
}

struct Run<'a> {
    project: &'a FunctionsProject,
    settings: &'a PipelineSettings,
    toolkit: &'a Toolkit,
    shell: &'a Arc<Shell>,
    opts: &'a DeployOptions,
    state: RunState,
    records: Vec<DeploymentRecord>,
}

impl Run<'_> {
    fn enter(&mut self, next: RunState) {
        tracing::debug!("run: {} -> {}", self.state, next);
        self.state = next;
    }

    fn execute(&mut self) -> Result<usize, PipelineError> {
        // Read before building; the build may touch the manifest.
        let original = self.project.load_manifest()?;

        let discovered = discover_triggers(self.project, self.settings, self.toolkit, self.shell)?;

        self.enter(RunState::Validating);
        let available: Vec<String> = discovered.iter().map(|t| t.entry_point.clone()).collect();
        let triggers = select_triggers(discovered, &self.opts.functions)
            .map_err(|missing| PipelineError::Validation { missing, available })?;
        if triggers.is_empty() {
            return Err(PipelineError::discovery("no functions found in the project"));
        }

        self.enter(RunState::Materializing);
        let mut staging = StagingRoot::acquire(self.project.root(), self.project.functions_dir())
            .map_err(|e| PipelineError::filesystem("cannot prepare staging directory", e))?;

        let mut subprojects = Vec::with_capacity(triggers.len());
        for trigger in triggers {
            let span = self.shell.span(
                Status::Creating,
                format!("subproject for `{}`", trigger.entry_point),
            );
            subprojects.push(create_subproject(
                self.project,
                &staging,
                trigger,
                &self.settings.excludes,
            )?);
            span.finish();
        }
        staging
            .relocate()
            .map_err(|e| PipelineError::filesystem("cannot relocate staging directory", e))?;

        self.enter(RunState::ProcessingSubprojects);
        let target = DeployTarget {
            project_id: self.project.project_id().to_string(),
            debug: self.opts.debug,
            commit: head_commit(self.project.root()),
        };
        let total = subprojects.len();
        for (i, sub) in subprojects.into_iter().enumerate() {
            let record = self.process(sub, i + 1, total, &original, &target)?;
            self.records.push(record);
        }

        self.enter(RunState::CleaningUp);
        staging
            .release()
            .map_err(|e| PipelineError::filesystem("cannot remove staging directory", e))?;

        Ok(total)
    }

    fn process(
        &self,
        sub: Subproject<state::Materialized>,
        index: usize,
        total: usize,
        original: &PackageManifest,
        target: &DeployTarget,
    ) -> Result<DeploymentRecord, PipelineError> {
        let function = sub.entry_point().to_string();
        self.shell.json_event(&DeployEvent::SubprojectStarted {
            function: &function,
            index,
            total,
        });

        let mut reached = SubprojectState::Materialized;
        let progress = format!("[{}/{}]", index, total);
        let result = self.drive(sub, &progress, original, target, &mut reached);

        match &result {
            Ok(record) => {
                let location = record
                    .url
                    .as_deref()
                    .map(|url| format!(" ({})", url))
                    .unwrap_or_default();
                self.shell
                    .status(Status::Deployed, format!("`{}`{}", function, location));
                self.shell
                    .json_event(&DeployEvent::FunctionDeployed { record });
            }
            Err(err) => {
                self.shell.json_event(&DeployEvent::SubprojectFailed {
                    function: &function,
                    state: reached.next().unwrap_or(reached),
                    message: err.to_string(),
                });
            }
        }

        result
    }

    fn drive(
        &self,
        sub: Subproject<state::Materialized>,
        progress: &str,
        original: &PackageManifest,
        target: &DeployTarget,
        reached: &mut SubprojectState,
    ) -> Result<DeploymentRecord, PipelineError> {
        let toolkit = self.toolkit;
        let settings = self.settings;
        let function = sub.entry_point().to_string();

        let span = self
            .shell
            .span(Status::Isolating, format!("{} function `{}`", progress, function));
        let (sub, report) = sub.isolate_entry(toolkit.isolator.as_ref(), settings)?;
        if !report.converged {
            tracing::warn!("import repair for `{}` did not converge", function);
            self.shell.warn(format!(
                "imports of `{}` still changing after {} passes, continuing",
                function, report.passes
            ));
        }
        self.stage_done(span, &function, sub.state(), reached, format!("isolating `{}`", function));

        let span = self.shell.span(Status::Pruning, format!("unused files of `{}`", function));
        let (sub, removed) = sub.eliminate_dead_code(toolkit.eliminator.as_ref(), settings)?;
        tracing::debug!("unreachable files removed: {}", removed);
        self.stage_done(
            span,
            &function,
            sub.state(),
            reached,
            format!("removing unused files of `{}` ({} removed)", function, removed),
        );

        let span = self.shell.span(Status::Pruning, format!("package of `{}`", function));
        let (sub, summary) = sub.prune_dependencies(toolkit.usage.as_ref(), original)?;
        tracing::debug!("dependencies removed: {} / {}", summary.removed, summary.total);
        self.stage_done(
            span,
            &function,
            sub.state(),
            reached,
            format!(
                "pruning package of `{}` ({}/{} dependencies removed)",
                function, summary.removed, summary.total
            ),
        );

        let span = self.shell.span(Status::Saving, format!("project files of `{}`", function));
        let sub = sub.write_manifest()?;
        self.stage_done(span, &function, sub.state(), reached, format!("saving project files of `{}`", function));

        let span = self.shell.span(Status::Building, format!("subproject `{}`", function));
        let sub = sub.rebuild(toolkit.runner.as_ref(), settings)?;
        self.stage_done(span, &function, sub.state(), reached, format!("building subproject `{}`", function));

        let span = self.shell.span(Status::Deploying, format!("function `{}`", function));
        let record = sub.deploy(toolkit.runner.as_ref(), settings, target)?;
        self.stage_done(
            span,
            &function,
            SubprojectState::Deployed,
            reached,
            format!("deploying `{}`", function),
        );

        Ok(record)
    }

    fn stage_done(
        &self,
        span: Span,
        function: &str,
        state: SubprojectState,
        reached: &mut SubprojectState,
        message: String,
    ) {
        let elapsed = span.elapsed();
        span.finish_with_message(message);
        *reached = state;
        self.shell.json_event(&DeployEvent::StageFinished {
            function,
            state,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        });
    }
}
