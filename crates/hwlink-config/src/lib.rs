//! Shared configuration for hwlink tools.
//!
//! Layered loading (defaults, `hwlink.toml`, `HWLINK_*` environment) and
//! translation to `hwlink_core::ProviderConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hwlink_core::{AutoConnectConfig, ProviderConfig};

const CONFIG_FILE: &str = "hwlink.toml";
const ENV_PREFIX: &str = "HWLINK_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub auto_connect: AutoConnectSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AutoConnectSection {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// First retry delay, doubled per attempt.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for AutoConnectSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_enabled() -> bool {
    true
}
fn default_retry_delay_ms() -> u64 {
    2_000
}
fn default_max_retry_delay_ms() -> u64 {
    30_000
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingSection {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "warn".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "hwlink", "hwlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push(CONFIG_FILE);
            p
        },
        |dirs| dirs.config_dir().join(CONFIG_FILE),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("hwlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file contributes nothing.
///
/// Environment variables use `__` between section and key, e.g.
/// `HWLINK_AUTO_CONNECT__MAX_RETRIES=5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Build the runtime configuration for a provider session.
    pub fn to_provider_config(&self) -> Result<ProviderConfig, ConfigError> {
        let section = &self.auto_connect;
        if section.retry_delay_ms == 0 {
            return Err(ConfigError::Validation {
                field: "auto_connect.retry_delay_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if section.max_retry_delay_ms < section.retry_delay_ms {
            return Err(ConfigError::Validation {
                field: "auto_connect.max_retry_delay_ms".into(),
                reason: format!(
                    "must be at least retry_delay_ms ({})",
                    section.retry_delay_ms
                ),
            });
        }

        Ok(ProviderConfig {
            auto_connect: AutoConnectConfig {
                enabled: section.enabled,
                initial_retry_delay: Duration::from_millis(section.retry_delay_ms),
                max_retry_delay: Duration::from_millis(section.max_retry_delay_ms),
                max_retries: section.max_retries,
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_provider_defaults() {
        let provider = Config::default().to_provider_config().unwrap();
        assert_eq!(provider, ProviderConfig::default());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "[auto_connect]\nenabled = false\nmax_retries = 7\n\n[logging]\njson = true\n",
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert!(!config.auto_connect.enabled);
        assert_eq!(config.auto_connect.max_retries, 7);
        assert_eq!(config.auto_connect.retry_delay_ms, 2_000);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[auto_connect]\nmax_retries = \"many\"\n").unwrap();

        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::Figment(_))
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let mut config = Config::default();
        config.auto_connect.retry_delay_ms = 500;
        config.logging.level = "debug".into();

        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn provider_config_translation() {
        let mut config = Config::default();
        config.auto_connect.retry_delay_ms = 250;
        config.auto_connect.max_retry_delay_ms = 1_000;

        let provider = config.to_provider_config().unwrap();
        assert_eq!(
            provider.auto_connect.initial_retry_delay,
            Duration::from_millis(250)
        );
        assert_eq!(provider.auto_connect.retry_delay(5), Duration::from_secs(1));
    }

    #[test]
    fn inverted_delays_are_rejected() {
        let mut config = Config::default();
        config.auto_connect.retry_delay_ms = 5_000;
        config.auto_connect.max_retry_delay_ms = 1_000;

        let err = config.to_provider_config().unwrap_err();
        assert!(err.to_string().contains("max_retry_delay_ms"));
    }
}
