//! Output formatter for human-readable and JSON output
//!
//! Ensures consistent output formatting across all commands.

use console::style;
use serde::Serialize;

use s3h_core::Error;

use super::OutputConfig;
use crate::exit_code::ExitCode;

/// Formatter for CLI output
///
/// Handles both human-readable and JSON output formats based on configuration.
/// When JSON mode is enabled, all output is strict JSON without colors or progress.
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    /// Create a new formatter with the given configuration
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Check if JSON output mode is enabled
    pub fn is_json(&self) -> bool {
        self.config.json
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.config.quiet
    }

    /// Check if colors are enabled
    pub fn colors_enabled(&self) -> bool {
        !self.config.no_color && !self.config.json
    }

    /// Output a success message
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }

        if self.colors_enabled() {
            println!("{} {message}", style("✓").green());
        } else {
            println!("✓ {message}");
        }
    }

    /// Output an error message
    ///
    /// Errors are always printed, even in quiet mode.
    pub fn error(&self, message: &str) {
        if self.config.json {
            let error = serde_json::json!({ "error": message });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&error).unwrap_or_else(|_| message.to_string())
            );
        } else if self.colors_enabled() {
            eprintln!("{} {message}", style("✗").red());
        } else {
            eprintln!("✗ {message}");
        }
    }

    /// Report a core error and return the matching exit code
    ///
    /// Batch errors list their failed items.
    pub fn fail(&self, context: &str, err: &Error) -> ExitCode {
        let code = ExitCode::from_error(err);

        if self.config.json {
            let mut body = serde_json::json!({
                "error": format!("{context}: {err}"),
                "exit_code": code.as_i32(),
            });
            match err {
                Error::PartialTransferFailure(failures) => {
                    body["failures"] = serde_json::json!(failures);
                }
                Error::RenameAborted {
                    migrated,
                    not_migrated,
                } => {
                    body["migrated"] = serde_json::json!(migrated);
                    body["not_migrated"] = serde_json::json!(not_migrated);
                }
                _ => {}
            }
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&body).unwrap_or_else(|_| err.to_string())
            );
            return code;
        }

        self.error(&format!("{context}: {err}"));
        let items = match err {
            Error::PartialTransferFailure(failures) => failures.as_slice(),
            Error::RenameAborted { not_migrated, .. } => not_migrated.as_slice(),
            _ => &[],
        };
        for failure in items {
            eprintln!("  {failure}");
        }
        code
    }

    /// Output a warning message
    pub fn warning(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }

        if self.colors_enabled() {
            eprintln!("{} {message}", style("⚠").yellow());
        } else {
            eprintln!("⚠ {message}");
        }
    }

    /// Output JSON directly
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    /// Print a line of text (respects quiet mode)
    pub fn println(&self, message: &str) {
        if self.config.quiet {
            return;
        }
        println!("{message}");
    }

    /// Style a folder name for human output
    pub fn folder(&self, name: &str) -> String {
        if self.colors_enabled() {
            style(format!("{name}/")).blue().bold().to_string()
        } else {
            format!("{name}/")
        }
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputConfig::default())
    }
}
