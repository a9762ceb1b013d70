//! Output formatting utilities
//!
//! This module provides formatters for CLI output in both human-readable
//! and JSON formats. It also handles progress bars and colored output.

mod formatter;
mod progress;

pub use formatter::Formatter;
pub use progress::ProgressBar;

/// Output configuration derived from CLI flags and config defaults
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Use JSON output format
    pub json: bool,
    /// Disable colored output
    pub no_color: bool,
    /// Disable progress bar
    pub no_progress: bool,
    /// Suppress non-error output
    pub quiet: bool,
}

impl OutputConfig {
    /// Whether a progress bar may be drawn
    pub fn progress_enabled(&self) -> bool {
        !(self.quiet || self.json || self.no_progress)
    }
}
