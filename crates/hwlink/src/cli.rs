//! Clap derive structures for the `hwlink` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use hwlink_core::HardwareWalletType;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// hwlink -- hardware wallet connection toolkit
#[derive(Debug, Parser)]
#[command(
    name = "hwlink",
    version,
    about = "Classify hardware wallet errors and simulate device connections",
    long_about = "Tools around the hwlink connection subsystem.\n\n\
        Classifies raw Ledger/Trezor failures into the shared error taxonomy,\n\
        decodes errors carried over JSON-RPC, and replays connection scenarios\n\
        against a simulated device.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HWLINK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "HWLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table (default)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classify a raw device or transport error
    Classify(ClassifyArgs),

    /// Reconstruct an error from a JSON or JSON-RPC payload
    Decode(DecodeArgs),

    /// Replay a connection scenario against a simulated device
    #[command(alias = "sim")]
    Simulate(SimulateArgs),

    /// Inspect configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Classify ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    /// Error message as reported by the device or transport
    pub message: String,

    /// Wallet the error came from (ledger, trezor, onekey, lattice, qr)
    #[arg(long, short = 'w', value_parser = parse_wallet)]
    pub wallet: Option<HardwareWalletType>,

    /// Vendor status word, hex (0x6985) or decimal
    #[arg(long, value_parser = parse_status)]
    pub status: Option<u16>,

    /// Exception name, e.g. TransportStatusError
    #[arg(long)]
    pub name: Option<String>,
}

// ── Decode ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// JSON payload, or '-' to read from stdin
    pub payload: String,

    /// Wallet to attribute the error to
    #[arg(long, short = 'w', value_parser = parse_wallet)]
    pub wallet: Option<HardwareWalletType>,
}

// ── Simulate ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Scenario to run
    #[arg(long, short = 's', value_enum, default_value = "happy")]
    pub scenario: Scenario,

    /// Wallet to simulate
    #[arg(long, short = 'w', value_parser = parse_wallet, default_value = "ledger")]
    pub wallet: HardwareWalletType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Select account, connect, verify, sign, disconnect
    Happy,
    /// Device starts locked, then gets unlocked
    Locked,
    /// Wrong app open, then the expected app is launched
    WrongApp,
    /// Cable pulled and reinserted
    Unplug,
    /// Two overlapping connects; the later one wins
    Race,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

// ── Value parsers ────────────────────────────────────────────────────

fn parse_wallet(value: &str) -> Result<HardwareWalletType, String> {
    value
        .parse()
        .map_err(|_| format!("unknown wallet '{value}' (expected ledger, trezor, onekey, lattice or qr)"))
}

fn parse_status(value: &str) -> Result<u16, String> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| format!("invalid status word '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_accepts_hex_and_decimal() {
        assert_eq!(parse_status("0x6985"), Ok(0x6985));
        assert_eq!(parse_status("27013"), Ok(0x6985));
        assert!(parse_status("0xZZ").is_err());
    }

    #[test]
    fn wallet_names_are_case_insensitive() {
        assert_eq!(parse_wallet("Ledger"), Ok(HardwareWalletType::Ledger));
        assert!(parse_wallet("keystone").is_err());
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
