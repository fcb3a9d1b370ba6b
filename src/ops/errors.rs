//! Pipeline error taxonomy and diagnostics.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::subproject::SubprojectState;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// A fatal pipeline failure. None of these are retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The project or its functions could not be introspected.
    #[error("{message}")]
    Discovery {
        message: String,
        suggestion: Option<&'static str>,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Requested functions were not found among the discovered triggers.
    #[error("cannot find all functions that should have been deployed")]
    Validation {
        missing: Vec<String>,
        available: Vec<String>,
    },

    /// The build command exited unsuccessfully.
    #[error("build failed in {} (exit code {})", .dir.display(), display_code(.exit_code))]
    Build {
        dir: PathBuf,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The deploy command exited unsuccessfully.
    #[error("deploy of `{function}` failed (exit code {})", display_code(.exit_code))]
    Deploy {
        function: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// A copy, move, remove, read or write failed.
    #[error("{action}")]
    Filesystem {
        action: String,
        #[source]
        source: anyhow::Error,
    },

    /// An analysis engine failed while moving a subproject into `state`.
    #[error("could not reach `{state}` for `{function}`")]
    Analysis {
        function: String,
        state: SubprojectState,
        #[source]
        source: anyhow::Error,
    },

    /// Configuration could not be loaded.
    #[error("invalid configuration")]
    Config {
        #[source]
        source: anyhow::Error,
    },
}

fn display_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none".to_string())
}

impl PipelineError {
    pub fn discovery(message: impl Into<String>) -> Self {
        PipelineError::Discovery {
            message: message.into(),
            suggestion: None,
            source: None,
        }
    }

    pub fn filesystem(action: impl Into<String>, source: anyhow::Error) -> Self {
        PipelineError::Filesystem {
            action: action.into(),
            source,
        }
    }

    pub fn analysis(function: impl Into<String>, state: SubprojectState, source: anyhow::Error) -> Self {
        PipelineError::Analysis {
            function: function.into(),
            state,
            source,
        }
    }

    /// Attach a suggestion to a discovery error. Other variants are unchanged.
    pub fn with_suggestion(mut self, hint: &'static str) -> Self {
        if let PipelineError::Discovery { suggestion, .. } = &mut self {
            *suggestion = Some(hint);
        }
        self
    }

    /// Attach an underlying cause to a discovery error.
    pub fn with_source(mut self, cause: anyhow::Error) -> Self {
        if let PipelineError::Discovery { source, .. } = &mut self {
            *source = Some(cause);
        }
        self
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            PipelineError::Discovery {
                suggestion, source, ..
            } => {
                let mut diag = diag;
                if let Some(source) = source {
                    diag = diag.with_context(format!("{:#}", source));
                }
                if let Some(hint) = suggestion {
                    diag = diag.with_suggestion(*hint);
                }
                diag
            }

            PipelineError::Validation { missing, available } => diag
                .with_context(format!("missing functions: {}", missing.join(" ")))
                .with_context(format!(
                    "available functions: {}",
                    if available.is_empty() {
                        "(none)".to_string()
                    } else {
                        available.join(" ")
                    }
                ))
                .with_suggestion(suggestions::LIST_FUNCTIONS),

            PipelineError::Build { stderr, .. } => {
                with_stderr(diag, stderr).with_suggestion(suggestions::INSTALL_MODULES)
            }

            PipelineError::Deploy { stderr, .. } => {
                with_stderr(diag, stderr).with_suggestion(suggestions::DEPLOY_DEBUG)
            }

            PipelineError::Filesystem { source, .. }
            | PipelineError::Analysis { source, .. }
            | PipelineError::Config { source } => diag.with_context(format!("{:#}", source)),
        }
    }
}

fn with_stderr(diag: Diagnostic, stderr: &str) -> Diagnostic {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        diag
    } else {
        diag.with_context(stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_diagnostic_lists_names() {
        let err = PipelineError::Validation {
            missing: vec!["doesNotExist".to_string()],
            available: vec!["sendEmail".to_string(), "processPayment".to_string()],
        };
        let output = err.to_diagnostic().format(false);
        assert!(output.contains("missing functions: doesNotExist"));
        assert!(output.contains("available functions: sendEmail processPayment"));
        assert!(output.contains("foundry list"));
    }

    #[test]
    fn test_build_error_carries_stderr() {
        let err = PipelineError::Build {
            dir: PathBuf::from("/tmp/functions"),
            exit_code: Some(2),
            stderr: "src/index.ts(3,1): error TS2304\n".to_string(),
        };
        assert_eq!(err.to_string(), "build failed in /tmp/functions (exit code 2)");
        assert!(err.to_diagnostic().format(false).contains("error TS2304"));
    }

    #[test]
    fn test_discovery_suggestion() {
        let err = PipelineError::discovery("no active project")
            .with_suggestion(suggestions::NO_ACTIVE_PROJECT);
        let output = err.to_diagnostic().format(false);
        assert!(output.contains("firebase use"));
    }

    #[test]
    fn test_signal_exit_code() {
        let err = PipelineError::Deploy {
            function: "sendEmail".to_string(),
            exit_code: None,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "deploy of `sendEmail` failed (exit code none)");
    }
}
