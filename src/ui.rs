//! CLI output formatting with colors.
//!
//! Progress and diagnostics go to stderr; data goes to stdout.
//! Colors auto-disable when output is not a TTY or NO_COLOR is set.

use crate::diagnostic::{Diagnostic, DiagnosticLevel};
use owo_colors::OwoColorize;
use std::fmt::Display;
use std::path::Path;

/// Check if stderr supports colors (TTY detection)
fn use_colors() -> bool {
    supports_color::on(supports_color::Stream::Stderr).is_some()
}

/// Check if stdout supports colors, for tables printed to stdout
pub fn stdout_supports_color() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

// =============================================================================
// Color Helpers
// =============================================================================

/// Format a success message (green checkmark prefix)
pub fn success(msg: impl Display) {
    if use_colors() {
        eprintln!("{} {}", "✓".green(), msg);
    } else {
        eprintln!("✓ {}", msg);
    }
}

/// Format an info/action message (no special prefix)
pub fn info(msg: impl Display) {
    eprintln!("{}", msg);
}

/// Format a created path message
pub fn created_path(path: &Path) {
    if use_colors() {
        eprintln!("{}: {}", "Created".green(), path.display().cyan());
    } else {
        eprintln!("Created: {}", path.display());
    }
}

/// Format a dry-run preview line
pub fn would(action: &str, target: impl Display) {
    if use_colors() {
        eprintln!("{} {} {}", "[dry-run]".bright_black(), action, target);
    } else {
        eprintln!("[dry-run] {} {}", action, target);
    }
}

/// Format a field set message
pub fn field_set(flow: &str, field: &str, value: &str) {
    if use_colors() {
        eprintln!(
            "Set {}.{} = {}",
            flow.cyan().bold(),
            field.yellow(),
            value.white()
        );
    } else {
        eprintln!("Set {}.{} = {}", flow, field, value);
    }
}

/// Format a list toggle message
pub fn toggled(flow: &str, field: &str, item: &str, selected: bool) {
    let verb = if selected { "Selected" } else { "Deselected" };
    if use_colors() {
        eprintln!(
            "{} '{}' in {}.{}",
            verb,
            item.white(),
            flow.cyan().bold(),
            field.yellow()
        );
    } else {
        eprintln!("{} '{}' in {}.{}", verb, item, flow, field);
    }
}

/// Format a row change message
pub fn row_changed(action: &str, flow: &str, field: &str, index: usize) {
    if use_colors() {
        eprintln!(
            "{} row {} of {}.{}",
            action,
            index.to_string().cyan(),
            flow.cyan().bold(),
            field.yellow()
        );
    } else {
        eprintln!("{} row {} of {}.{}", action, index, flow, field);
    }
}

/// Format a step move message
pub fn moved_to(flow: &str, step: &str, position: usize, total: usize) {
    if use_colors() {
        eprintln!(
            "{} step {}/{}: {}",
            flow.cyan().bold(),
            position,
            total,
            step.green().bold()
        );
    } else {
        eprintln!("{} step {}/{}: {}", flow, position, total, step);
    }
}

/// Format a step completed message
pub fn completed(step: &str) {
    if use_colors() {
        eprintln!("{} Completed {}", "✓".green(), step.green());
    } else {
        eprintln!("✓ Completed {}", step);
    }
}

/// Format a submitted report message
pub fn submitted(id: &str, path: &Path) {
    if use_colors() {
        eprintln!(
            "{} Submitted {} to {}",
            "✓".green(),
            id.cyan().bold(),
            path.display().cyan()
        );
    } else {
        eprintln!("✓ Submitted {} to {}", id, path.display());
    }
}

/// Format a rejection message
pub fn rejected(flow: &str, step: &str, reason: &str) {
    if use_colors() {
        eprintln!(
            "{} {} at {}: {}",
            "Rejected".red().bold(),
            flow.cyan().bold(),
            step.yellow(),
            reason
        );
    } else {
        eprintln!("Rejected {} at {}: {}", flow, step, reason);
    }
}

// =============================================================================
// Diagnostic Formatting
// =============================================================================

/// Format a diagnostic message
pub fn diagnostic(diag: &Diagnostic) {
    if use_colors() {
        let level_str = match diag.level {
            DiagnosticLevel::Error => "error".red().bold().to_string(),
            DiagnosticLevel::Warning => "warning".yellow().bold().to_string(),
        };
        eprintln!(
            "{}[{}]: {} ({})",
            level_str,
            diag.code.code().bright_black(),
            diag.message,
            diag.file.cyan()
        );
    } else {
        eprintln!("{diag}");
    }
}
