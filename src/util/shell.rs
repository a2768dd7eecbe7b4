//! Centralized shell output and progress management.
//!
//! The Shell module provides a unified API for all CLI output:
//! - Status messages with consistent formatting
//! - Progress bars (via indicatif)
//! - Scoped timing spans
//!
//! Every message carries the verbosity level it belongs to. A message is
//! printed when the shell's verbosity is at least that level, so `Silent`
//! prints nothing and `Verbose` prints everything.

use std::fmt::Display;
use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

/// Output verbosity level, ordered from least to most output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// --silent: no output at all
    Silent,
    /// --quiet: warnings and errors only, no progress
    Quiet,
    /// Default: status messages + progress bars
    #[default]
    Normal,
    /// --verbose: every message, no progress bars
    Verbose,
}

impl std::str::FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" => Ok(Verbosity::Silent),
            "quiet" => Ok(Verbosity::Quiet),
            "normal" => Ok(Verbosity::Normal),
            "verbose" => Ok(Verbosity::Verbose),
            _ => Err(format!(
                "invalid verbosity '{}'; expected 'silent', 'quiet', 'normal', or 'verbose'",
                s
            )),
        }
    }
}

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
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
    Finished,
    Passed,
    Removed,

    // In-progress statuses (cyan)
    Building,
    Compiling,
    Linking,
    Testing,

    // Info statuses (blue/default)
    Info,

    // Warning statuses (yellow)
    Warning,

    // Error status (red)
    Error,
}

impl Status {
    /// Get the display text for this status.
    fn as_str(&self) -> &'static str {
        match self {
            Status::Finished => "Finished",
            Status::Passed => "Passed",
            Status::Removed => "Removed",
            Status::Building => "Building",
            Status::Compiling => "Compiling",
            Status::Linking => "Linking",
            Status::Testing => "Testing",
            Status::Info => "Info",
            Status::Warning => "Warning",
            Status::Error => "error",
        }
    }

    /// Get the ANSI color code for this status.
    fn color_code(&self) -> &'static str {
        match self {
            Status::Finished | Status::Passed | Status::Removed => "\x1b[1;32m",
            Status::Building
            | Status::Compiling
            | Status::Linking
            | Status::Testing => "\x1b[1;36m",
            Status::Info => "\x1b[1;34m",
            Status::Warning => "\x1b[1;33m",
            Status::Error => "\x1b[1;31m",
        }
    }

    /// Get the width for alignment (12 characters).
    fn width(&self) -> usize {
        12
    }
}

/// Central shell for all CLI output.
#[derive(Debug)]
pub struct Shell {
    verbosity: Verbosity,
    use_color: bool,
}

impl Shell {
    /// Create a new shell.
    pub fn new(verbosity: Verbosity, color: ColorChoice) -> Self {
        let use_color = match color {
            ColorChoice::Auto => io::stderr().is_terminal(),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        };

        Shell {
            verbosity,
            use_color,
        }
    }

    /// A shell that prints nothing.
    pub fn silent() -> Self {
        Shell::new(Verbosity::Silent, ColorChoice::Never)
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Check if shell is in verbose mode.
    pub fn is_verbose(&self) -> bool {
        self.verbosity >= Verbosity::Verbose
    }

    /// Whether messages at `level` are printed.
    pub fn enabled(&self, level: Verbosity) -> bool {
        level != Verbosity::Silent && self.verbosity >= level
    }

    /// Check if colors are enabled.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Print a status message at the given level.
    ///
    /// Format: `{status:>12} {message}`
    pub fn status_at(&self, level: Verbosity, status: Status, msg: impl Display) {
        if !self.enabled(level) {
            return;
        }
        eprintln!("{} {}", self.format_status(status), msg);
    }

    /// Print a status message at normal verbosity.
    pub fn status(&self, status: Status, msg: impl Display) {
        self.status_at(Verbosity::Normal, status, msg);
    }

    /// Print an info message shown only in verbose mode.
    pub fn verbose(&self, msg: impl Display) {
        self.status_at(Verbosity::Verbose, Status::Info, msg);
    }

    /// Print an info message.
    pub fn note(&self, msg: impl Display) {
        self.status(Status::Info, msg);
    }

    /// Print a warning message, shown unless silent.
    pub fn warn(&self, msg: impl Display) {
        self.status_at(Verbosity::Quiet, Status::Warning, msg);
    }

    /// Print an error message, shown unless silent.
    pub fn error(&self, msg: impl Display) {
        self.status_at(Verbosity::Quiet, Status::Error, msg);
    }

    /// Format a status prefix with optional color.
    fn format_status(&self, status: Status) -> String {
        let text = status.as_str();
        let width = status.width();

        if self.use_color {
            let color = status.color_code();
            format!("{}{:>width$}\x1b[0m", color, text, width = width)
        } else {
            format!("{:>width$}", text, width = width)
        }
    }

    /// Create a scoped span for timing operations.
    pub fn span(self: &Arc<Self>, status: Status, msg: impl Display) -> Span {
        Span::new(Arc::clone(self), status, msg.to_string())
    }

    /// Create a progress bar.
    ///
    /// Only normal verbosity draws a bar; verbose mode prints status lines
    /// instead and quieter modes print nothing.
    pub fn progress(self: &Arc<Self>, total: u64, msg: impl Display) -> Progress {
        Progress::new(Arc::clone(self), total, msg.to_string())
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(Verbosity::Normal, ColorChoice::Auto)
    }
}

/// A scoped timing span.
///
/// The start message is printed immediately; the end message includes the
/// elapsed time.
pub struct Span {
    shell: Arc<Shell>,
    start: Instant,
}

impl Span {
    fn new(shell: Arc<Shell>, status: Status, message: String) -> Self {
        shell.status(status, &message);
        Span {
            shell,
            start: Instant::now(),
        }
    }

    /// Mark the span as finished with a custom message.
    pub fn finish_with_message(self, msg: impl Display) {
        let duration_str = format_duration(self.start.elapsed());
        self.shell
            .status(Status::Finished, format!("{} in {}", msg, duration_str));
    }

    /// Get elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Progress bar wrapper that respects shell verbosity.
pub struct Progress {
    pb: Option<ProgressBar>,
}

impl Progress {
    fn new(shell: Arc<Shell>, total: u64, message: String) -> Self {
        let pb = if shell.verbosity() == Verbosity::Normal && total > 1 && io::stderr().is_terminal() {
            let pb = ProgressBar::new(total);
            if let Ok(style) =
                ProgressStyle::default_bar().template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb.set_message(message);
            Some(pb)
        } else {
            None
        };

        Progress { pb }
    }

    /// Advance the bar and show what is being worked on.
    pub fn tick(&self, msg: impl Display) {
        if let Some(pb) = &self.pb {
            pb.set_message(msg.to_string());
            pb.inc(1);
        }
    }

    /// Finish the progress bar.
    pub fn finish(&self) {
        if let Some(pb) = &self.pb {
            pb.finish_and_clear();
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Format a duration in a human-readable way.
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        let mins = secs / 60.0;
        format!("{:.1}m", mins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        let normal = Shell::new(Verbosity::Normal, ColorChoice::Never);
        assert!(normal.enabled(Verbosity::Quiet));
        assert!(normal.enabled(Verbosity::Normal));
        assert!(!normal.enabled(Verbosity::Verbose));

        let quiet = Shell::new(Verbosity::Quiet, ColorChoice::Never);
        assert!(quiet.enabled(Verbosity::Quiet));
        assert!(!quiet.enabled(Verbosity::Normal));

        let silent = Shell::silent();
        assert!(!silent.enabled(Verbosity::Quiet));
        assert!(!silent.enabled(Verbosity::Silent));

        let verbose = Shell::new(Verbosity::Verbose, ColorChoice::Never);
        assert!(verbose.is_verbose());
        assert!(verbose.enabled(Verbosity::Verbose));
    }

    #[test]
    fn test_parse_choices() {
        assert_eq!("always".parse::<ColorChoice>().unwrap(), ColorChoice::Always);
        assert!("sometimes".parse::<ColorChoice>().is_err());
        assert_eq!("QUIET".parse::<Verbosity>().unwrap(), Verbosity::Quiet);
        assert!("loud".parse::<Verbosity>().is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "0.50s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_status_formatting() {
        let shell = Shell::new(Verbosity::Normal, ColorChoice::Never);

        let formatted = shell.format_status(Status::Linking);
        assert_eq!(formatted.trim(), "Linking");
        assert_eq!(formatted.len(), 12); // Right-aligned to 12 chars
    }
}
