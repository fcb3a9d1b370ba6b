//! Core data model.

pub mod manifest;
pub mod platform;
pub mod project;
pub mod staging;
pub mod subproject;
pub mod trigger;

pub use manifest::PackageManifest;
pub use platform::{FirebaseConfig, FirebaseRc};
pub use project::FunctionsProject;
pub use staging::StagingRoot;
pub use subproject::{Subproject, SubprojectPaths, SubprojectState};
pub use trigger::{Trigger, TriggerKind};
