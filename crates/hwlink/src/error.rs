//! CLI error types with miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use hwlink_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const SIMULATION: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Input ────────────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(hwlink::validation))]
    Validation { field: String, reason: String },

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(
        code(hwlink::json),
        help("Pass a serialized error or a JSON-RPC error object, or '-' to read stdin.")
    )]
    Json(#[from] serde_json::Error),

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(hwlink::config),
        help("Check the config file (see: hwlink config path) and HWLINK_* environment variables.")
    )]
    Config(#[from] ConfigError),

    #[error("failed to render config: {0}")]
    #[diagnostic(code(hwlink::config_render))]
    ConfigRender(#[from] toml::ser::Error),

    // ── Simulation ───────────────────────────────────────────────────
    #[error("Simulation '{scenario}' did not reach {expected}")]
    #[diagnostic(
        code(hwlink::simulation),
        help("Run with -vv to trace the state transitions.")
    )]
    Simulation { scenario: String, expected: String },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::Json(_) => exit_code::USAGE,
            Self::Config(_) | Self::ConfigRender(_) => exit_code::CONFIG,
            Self::Simulation { .. } => exit_code::SIMULATION,
            Self::Io(_) => exit_code::GENERAL,
        }
    }
}
