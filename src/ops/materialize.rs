//! Subproject materialization.

use glob::Pattern;

use crate::core::platform::{FIREBASERC, FIREBASE_JSON};
use crate::core::project::DEFAULT_FUNCTIONS_DIR;
use crate::core::staging::{StagingRoot, STAGING_DIR_NAME};
use crate::core::subproject::{state, Subproject, SubprojectPaths};
use crate::core::{FunctionsProject, Trigger};
use crate::ops::errors::PipelineError;
use crate::util::fs::{copy_dir_filtered, ensure_dir};

/// Directory of installed dependencies, never copied.
const NODE_MODULES: &str = "node_modules";

/// Copy the project into a fresh subproject for `trigger`.
///
/// The functions directory is copied without installed dependencies or the
/// staging directory. `firebase.json` is written with its pre-deploy hooks
/// cleared and its functions source pointing at the copy; `.firebaserc` is
/// copied verbatim when present.
pub fn create_subproject(
    project: &FunctionsProject,
    staging: &StagingRoot,
    trigger: Trigger,
    excludes: &[Pattern],
) -> Result<Subproject<state::Materialized>, PipelineError> {
    let paths = SubprojectPaths::new(
        staging.staging_dir(),
        staging.relocated_dir(),
        &trigger.entry_point,
    );

    let copied = copy_dir_filtered(
        project.functions_dir(),
        &paths.functions_dir,
        &[NODE_MODULES, STAGING_DIR_NAME],
        excludes,
    )
    .map_err(|e| {
        PipelineError::filesystem(
            format!("cannot copy functions for `{}`", trigger.entry_point),
            e,
        )
    })?;
    tracing::debug!(
        "copied {} file(s) into {}",
        copied,
        paths.functions_dir.display()
    );

    ensure_dir(&paths.root_dir)
        .map_err(|e| PipelineError::filesystem("cannot create subproject directory", e))?;

    let mut firebase = project.firebase().clone();
    firebase.clear_predeploy_hooks();
    firebase.set_functions_source(DEFAULT_FUNCTIONS_DIR);
    firebase
        .save(&paths.root_dir.join(FIREBASE_JSON))
        .map_err(|e| PipelineError::filesystem(format!("cannot write `{}`", FIREBASE_JSON), e))?;

    let rc = project.root().join(FIREBASERC);
    if rc.is_file() {
        std::fs::copy(&rc, paths.root_dir.join(FIREBASERC)).map_err(|e| {
            PipelineError::filesystem(format!("cannot copy `{}`", FIREBASERC), e.into())
        })?;
    }

    Ok(Subproject::materialized(trigger, paths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TriggerKind;
    use crate::test_support::FunctionsFixture;
    use crate::util::config::Config;
    use serde_json::Value;
    use std::fs;

    #[test]
    fn test_subproject_layout() {
        let fixture = FunctionsFixture::standard().with_file("functions/node_modules/pkg/index.js", "");
        let project = fixture.open(&Config::default());
        let staging = StagingRoot::acquire(project.root(), project.functions_dir()).unwrap();

        let sub = create_subproject(
            &project,
            &staging,
            Trigger::new("sendEmail", TriggerKind::Http),
            &[],
        )
        .unwrap();

        let paths = sub.paths();
        assert!(paths.root_dir.ends_with(".foundry/sendEmail-subproject"));
        assert!(paths.functions_dir.join("src/index.ts").is_file());
        assert!(paths.functions_dir.join("package.json").is_file());
        assert!(!paths.functions_dir.join("node_modules").exists());
        assert!(paths.root_dir.join(".firebaserc").is_file());

        let firebase: Value =
            serde_json::from_str(&fs::read_to_string(paths.root_dir.join("firebase.json")).unwrap())
                .unwrap();
        assert_eq!(firebase["functions"]["predeploy"], serde_json::json!([]));

        staging.release().unwrap();
    }

    #[test]
    fn test_excludes_apply() {
        let fixture = FunctionsFixture::standard().with_file("functions/coverage/lcov.info", "");
        let project = fixture.open(&Config::default());
        let staging = StagingRoot::acquire(project.root(), project.functions_dir()).unwrap();
        let excludes = vec![Pattern::new("coverage").unwrap()];

        let sub = create_subproject(
            &project,
            &staging,
            Trigger::new("sendEmail", TriggerKind::Http),
            &excludes,
        )
        .unwrap();
        assert!(!sub.paths().functions_dir.join("coverage").exists());
    }

    #[test]
    fn test_non_default_source_points_at_copy() {
        let fixture = FunctionsFixture::empty()
            .with_file(
                "firebase.json",
                r#"{"functions": {"source": "backend", "predeploy": ["npm run lint"]}}"#,
            )
            .with_file(".firebaserc", r#"{"projects": {"default": "demo"}}"#)
            .with_file("backend/package.json", r#"{"main": "lib/index.js"}"#)
            .with_file("backend/src/index.ts", "export const sendEmail = 1;\n");
        let project = fixture.open(&Config::default());
        let staging = StagingRoot::acquire(project.root(), project.functions_dir()).unwrap();

        let sub = create_subproject(
            &project,
            &staging,
            Trigger::new("sendEmail", TriggerKind::Http),
            &[],
        )
        .unwrap();

        let paths = sub.paths();
        assert!(paths.functions_dir.join("src/index.ts").is_file());
        assert!(!paths.root_dir.join("backend").exists());

        let firebase: Value =
            serde_json::from_str(&fs::read_to_string(paths.root_dir.join("firebase.json")).unwrap())
                .unwrap();
        assert_eq!(firebase["functions"]["source"], "functions");
        assert!(paths.root_dir.join(firebase["functions"]["source"].as_str().unwrap()).is_dir());

        let original = fs::read_to_string(fixture.root().join("firebase.json")).unwrap();
        assert!(original.contains("backend"));

        staging.release().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_failure_is_fatal() {
        let fixture = FunctionsFixture::standard();
        std::os::unix::fs::symlink(
            fixture.root().join("missing-target"),
            fixture.root().join("functions/dangling.ts"),
        )
        .unwrap();
        let project = fixture.open(&Config::default());
        let staging = StagingRoot::acquire(project.root(), project.functions_dir()).unwrap();

        let err = create_subproject(
            &project,
            &staging,
            Trigger::new("sendEmail", TriggerKind::Http),
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Filesystem { .. }));
    }
}
