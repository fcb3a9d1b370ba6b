//! High-level operations.
//!
//! This module contains the implementation of Foundry commands and the
//! per-subproject pipeline they drive.

pub mod errors;
pub mod events;
pub mod exec;
pub mod foundry_clean;
pub mod foundry_deploy;
pub mod foundry_list;
pub mod materialize;
pub mod pipeline;
pub mod prune;

pub use errors::PipelineError;
pub use events::DeployEvent;
pub use foundry_clean::clean;
pub use foundry_deploy::{deploy, discover_triggers, DeployOptions, DeployReport, RunState};
pub use foundry_list::{format_triggers, list_functions};
pub use materialize::create_subproject;
pub use pipeline::{DeployTarget, DeploymentRecord, PipelineSettings, Toolkit};
pub use prune::{prune_manifest, PruneSummary};
