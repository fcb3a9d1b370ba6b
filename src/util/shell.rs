//! Centralized shell output and progress management.
//!
//! The Shell module provides a unified API for all CLI output, including:
//! - Status messages with consistent formatting
//! - Named timing spans, with a spinner while they run on a terminal
//! - JSON output mode for machine-readable output
//!
//! # Design Principles
//!
//! 1. **Commands never manage spacing/indentation directly** - Shell handles all formatting
//! 2. **JSON mode is mutually exclusive** - No human output when JSON mode is enabled
//! 3. **Timing is always shown** - Span end messages include the span name and duration

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

/// Shell output mode - Human and Json are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellMode {
    /// Human-readable output with optional colors and spinners.
    Human {
        verbosity: Verbosity,
        color: ColorChoice,
    },
    /// Machine-readable JSON output only.
    Json,
}

impl Default for ShellMode {
    fn default() -> Self {
        ShellMode::Human {
            verbosity: Verbosity::Normal,
            color: ColorChoice::Auto,
        }
    }
}

/// Output verbosity level (Human mode only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// --quiet: errors only
    Quiet,
    /// Default: status messages + spinners
    #[default]
    Normal,
    /// --verbose: status lines and debug info, no spinners
    Verbose,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Detect TTY and use colors if available.
    #[default]
    Auto,
    /// Always use ANSI colors.
    Always,
    /// Never use ANSI colors.
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "invalid color choice '{}'; expected 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

/// Status types for output messages.
///
/// Shell handles all formatting - callers just specify the semantic status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    // Success statuses (green)
    Created,
    Deployed,
    Finished,
    Removed,

    // In-progress statuses (cyan)
    Analyzing,
    Building,
    Creating,
    Deploying,
    Isolating,
    Pruning,
    Saving,

    // Info statuses (blue/default)
    Info,

    // Warning statuses (yellow)
    Warning,

    // Error statuses (red)
    Failed,
    Error,
}

impl Status {
    /// Get the display text for this status.
    fn as_str(&self) -> &'static str {
        match self {
            Status::Created => "Created",
            Status::Deployed => "Deployed",
            Status::Finished => "Finished",
            Status::Removed => "Removed",
            Status::Analyzing => "Analyzing",
            Status::Building => "Building",
            Status::Creating => "Creating",
            Status::Deploying => "Deploying",
            Status::Isolating => "Isolating",
            Status::Pruning => "Pruning",
            Status::Saving => "Saving",
            Status::Info => "Info",
            Status::Warning => "Warning",
            Status::Failed => "Failed",
            Status::Error => "error",
        }
    }

    /// Get the ANSI color code for this status.
    fn color_code(&self) -> &'static str {
        match self {
            Status::Created | Status::Deployed | Status::Finished | Status::Removed => "\x1b[1;32m",
            Status::Analyzing
            | Status::Building
            | Status::Creating
            | Status::Deploying
            | Status::Isolating
            | Status::Pruning
            | Status::Saving => "\x1b[1;36m",
            Status::Info => "\x1b[1;34m",
            Status::Warning => "\x1b[1;33m",
            Status::Failed | Status::Error => "\x1b[1;31m",
        }
    }

    fn is_error(&self) -> bool {
        matches!(self, Status::Failed | Status::Error)
    }
}

const STATUS_WIDTH: usize = 12;

/// Central shell for all CLI output.
#[derive(Debug)]
pub struct Shell {
    mode: ShellMode,
    use_color: bool,
    is_terminal: bool,
}

impl Shell {
    /// Create a new shell with the given mode.
    pub fn new(mode: ShellMode) -> Self {
        let is_terminal = io::stderr().is_terminal();
        let use_color = match &mode {
            ShellMode::Json => false,
            ShellMode::Human { color, .. } => match color {
                ColorChoice::Auto => is_terminal,
                ColorChoice::Always => true,
                ColorChoice::Never => false,
            },
        };

        Shell {
            mode,
            use_color,
            is_terminal,
        }
    }

    /// Create a shell from CLI flags with proper precedence.
    ///
    /// JSON mode takes precedence over quiet/verbose.
    pub fn from_flags(quiet: bool, verbose: bool, color: ColorChoice, json: bool) -> Self {
        let mode = if json {
            ShellMode::Json
        } else {
            let verbosity = if quiet {
                Verbosity::Quiet
            } else if verbose {
                Verbosity::Verbose
            } else {
                Verbosity::Normal
            };
            ShellMode::Human { verbosity, color }
        };

        Shell::new(mode)
    }

    /// A shell that prints nothing but errors.
    pub fn quiet() -> Self {
        Shell::new(ShellMode::Human {
            verbosity: Verbosity::Quiet,
            color: ColorChoice::Never,
        })
    }

    /// Get the current shell mode.
    pub fn mode(&self) -> &ShellMode {
        &self.mode
    }

    /// Check if shell is in quiet mode.
    pub fn is_quiet(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Quiet,
                ..
            }
        )
    }

    /// Check if shell is in verbose mode.
    pub fn is_verbose(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Verbose,
                ..
            }
        )
    }

    /// Check if shell is in JSON mode.
    pub fn is_json(&self) -> bool {
        matches!(self.mode, ShellMode::Json)
    }

    /// Check if colors are enabled.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Print a status message.
    ///
    /// Format: `{status:>12} {message}`
    ///
    /// In quiet mode, only error statuses are printed.
    /// In JSON mode, messages are silently ignored (use `json_event` for JSON output).
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_json() {
            return;
        }

        if self.is_quiet() && !status.is_error() {
            return;
        }

        eprintln!("{} {}", self.format_status(status), msg);
    }

    /// Print an info message.
    pub fn note(&self, msg: impl Display) {
        self.status(Status::Info, msg);
    }

    /// Print a warning message.
    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    /// Print an error message.
    ///
    /// In JSON mode, this outputs a JSON error event.
    pub fn error(&self, msg: impl Display) {
        if self.is_json() {
            let event = serde_json::json!({
                "reason": "error",
                "message": msg.to_string()
            });
            self.json_event(&event);
        } else {
            self.status(Status::Error, msg);
        }
    }

    /// Print a JSON event to stdout.
    ///
    /// Only works in JSON mode; silently ignored in human mode.
    pub fn json_event<T: Serialize>(&self, event: &T) {
        if !self.is_json() {
            return;
        }

        match serde_json::to_string(event) {
            Ok(line) => {
                println!("{}", line);
                let _ = io::stdout().flush();
            }
            Err(e) => tracing::warn!("failed to serialize event: {}", e),
        }
    }

    /// Format a status prefix with optional color.
    fn format_status(&self, status: Status) -> String {
        let text = status.as_str();

        if self.use_color {
            let color = status.color_code();
            format!("{}{:>width$}\x1b[0m", color, text, width = STATUS_WIDTH)
        } else {
            format!("{:>width$}", text, width = STATUS_WIDTH)
        }
    }

    /// Create a named timing span.
    ///
    /// The start line is printed immediately (or shown as a spinner on a
    /// terminal in normal mode). Finishing prints the span name with its
    /// duration; dropping an unfinished span reports it as failed.
    pub fn span(self: &Arc<Self>, status: Status, msg: impl Display) -> Span {
        Span::new(Arc::clone(self), status, msg.to_string())
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(ShellMode::default())
    }
}

/// A named timing measurement.
pub struct Span {
    shell: Arc<Shell>,
    message: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    finished: bool,
}

impl Span {
    fn new(shell: Arc<Shell>, status: Status, message: String) -> Self {
        let interactive = shell.is_terminal && !shell.is_verbose();
        let spinner = if shell.is_quiet() || shell.is_json() {
            None
        } else if interactive {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {prefix} {msg}") {
                pb.set_style(style);
            }
            pb.set_prefix(shell.format_status(status));
            pb.set_message(message.clone());
            pb.enable_steady_tick(Duration::from_millis(120));
            Some(pb)
        } else {
            shell.status(status, &message);
            None
        };

        Span {
            shell,
            message,
            start: Instant::now(),
            spinner,
            finished: false,
        }
    }

    /// Mark the span as finished, printing its name and duration.
    pub fn finish(self) {
        let message = self.message.clone();
        self.finish_with_message(message);
    }

    /// Mark the span as finished with a custom message.
    pub fn finish_with_message(mut self, msg: impl Display) {
        self.finished = true;
        self.clear_spinner();
        let elapsed = self.start.elapsed();
        self.shell.status(
            Status::Finished,
            format!("{} in {}", msg, format_duration(elapsed)),
        );
    }

    /// Get elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn clear_spinner(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        self.clear_spinner();
        let elapsed = self.start.elapsed();
        self.shell.status(
            Status::Failed,
            format!("{} after {}", self.message, format_duration(elapsed)),
        );
    }
}

/// Format a duration in a human-readable way.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_modes() {
        let shell = Shell::new(ShellMode::Human {
            verbosity: Verbosity::Normal,
            color: ColorChoice::Never,
        });
        assert!(!shell.is_quiet());
        assert!(!shell.is_verbose());
        assert!(!shell.is_json());

        assert!(Shell::quiet().is_quiet());

        let json_shell = Shell::new(ShellMode::Json);
        assert!(json_shell.is_json());
    }

    #[test]
    fn test_color_choice_parse() {
        assert_eq!("auto".parse::<ColorChoice>().unwrap(), ColorChoice::Auto);
        assert_eq!("ALWAYS".parse::<ColorChoice>().unwrap(), ColorChoice::Always);
        assert_eq!("never".parse::<ColorChoice>().unwrap(), ColorChoice::Never);
        assert!("sometimes".parse::<ColorChoice>().is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "0.50s");
        assert_eq!(format_duration(Duration::from_secs(2)), "2.00s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_status_formatting() {
        let shell = Shell::new(ShellMode::Human {
            verbosity: Verbosity::Normal,
            color: ColorChoice::Never,
        });

        let formatted = shell.format_status(Status::Deploying);
        assert_eq!(formatted.trim(), "Deploying");
        assert_eq!(formatted.len(), STATUS_WIDTH);
    }

    #[test]
    fn test_from_flags() {
        let shell = Shell::from_flags(true, false, ColorChoice::Auto, false);
        assert!(shell.is_quiet());

        let shell = Shell::from_flags(false, true, ColorChoice::Auto, false);
        assert!(shell.is_verbose());

        // JSON takes precedence
        let shell = Shell::from_flags(true, true, ColorChoice::Auto, true);
        assert!(shell.is_json());
        assert!(!shell.is_quiet());
    }

    #[test]
    fn test_quiet_span_finishes_silently() {
        let shell = Arc::new(Shell::quiet());
        let span = shell.span(Status::Building, "Building project");
        assert!(span.spinner.is_none());
        span.finish();
    }
}
