//! Foundry - per-function isolation and tree-shaking deploys for Firebase
//!
//! This crate provides the core library functionality for Foundry: project
//! discovery, the typed subproject lifecycle, the static-analysis engines
//! and the deploy pipeline that ties them together.

pub mod analysis;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and mocks for Foundry unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides a scripted command runner, fake analysis
/// engines and on-disk project fixtures.
#[cfg(test)]
pub mod test_support;

pub use core::{
    manifest::PackageManifest, project::FunctionsProject, subproject::Subproject,
    subproject::SubprojectState, trigger::Trigger,
};

pub use ops::PipelineError;
pub use util::context::GlobalContext;
