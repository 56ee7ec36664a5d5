//! Output formatting: table or JSON.
//!
//! Renders data in the format selected by `--output`. Tables use `tabled`,
//! structured formats use serde.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use hwlink_core::ConnectionState;

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Connection state label, colored by health.
pub fn state_label(state: &ConnectionState, color: bool) -> String {
    let label = state.to_string();
    if !color {
        return label;
    }
    match state {
        ConnectionState::Ready | ConnectionState::Connected => label.green().to_string(),
        ConnectionState::Connecting
        | ConnectionState::AwaitingConfirmation
        | ConnectionState::AwaitingApp { .. } => label.yellow().to_string(),
        ConnectionState::Error { .. } => label.red().to_string(),
        ConnectionState::Disconnected => label.dimmed().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since detail views are laid out by
/// hand.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(data)?),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Table helpers ────────────────────────────────────────────────────

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Two-column `key  value` block with aligned keys.
pub fn render_detail(pairs: &[(&str, String)]) -> String {
    let width = pairs.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    pairs
        .iter()
        .map(|(key, value)| format!("{key:<width$}  {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_aligns_keys() {
        let out = render_detail(&[("code", "UserRejected".into()), ("retryable", "no".into())]);
        assert_eq!(out, "code       UserRejected\nretryable  no");
    }

    #[test]
    fn plain_labels_without_color() {
        assert_eq!(state_label(&ConnectionState::Ready, false), "ready");
    }
}
