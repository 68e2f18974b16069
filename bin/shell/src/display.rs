//! Display utilities for the shell

use colored::Colorize;

/// Prompt shown before each command
pub(crate) fn prompt() -> String {
    format!("{} ", "uicc>".bold())
}

/// Format a success message
pub(crate) fn success(message: &str) -> String {
    format!("{}", message.green())
}

/// Format a warning message
pub(crate) fn warning(message: &str) -> String {
    format!("{}", message.yellow().bold())
}

/// Format an error message
pub(crate) fn error(message: &str) -> String {
    format!("{}", message.red().bold())
}

/// Format a notification coming from the background watcher
pub(crate) fn notice(message: &str) -> String {
    format!("\n{} {}", "*".blue().bold(), message.blue())
}
