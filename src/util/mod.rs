//! Shared utilities

pub mod config;
pub mod context;
pub mod diagnostic;
pub mod fs;
pub mod process;
pub mod shell;
pub mod vcs;

pub use config::Config;
pub use context::GlobalContext;
pub use diagnostic::Diagnostic;
pub use process::{CommandRunner, ProcessBuilder, ProcessOutcome, SystemRunner};
pub use shell::Shell;
