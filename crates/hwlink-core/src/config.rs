// ── Runtime provider configuration ──
//
// Tuning for a provider session. Core never reads config files: the
// `hwlink-config` crate (or a test) builds a `ProviderConfig` and hands
// it in.

use std::time::Duration;

/// Auto-connect behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoConnectConfig {
    /// Connect without user action when the conditions allow it.
    pub enabled: bool,
    /// Delay before the first retry of a failed auto-connect.
    pub initial_retry_delay: Duration,
    /// Upper bound for the doubled retry delay.
    pub max_retry_delay: Duration,
    /// Retries per account selection. 0 disables retrying.
    pub max_retries: u32,
}

impl Default for AutoConnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_retry_delay: Duration::from_secs(2),
            max_retry_delay: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

impl AutoConnectConfig {
    /// Delay before retry number `attempt` (0-based):
    /// `min(initial * 2^attempt, max)`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.initial_retry_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(self.max_retry_delay)
    }
}

/// Configuration for one provider session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    pub auto_connect: AutoConnectConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_auto_connect_config() {
        let config = AutoConnectConfig::default();
        assert!(config.enabled);
        assert_eq!(config.initial_retry_delay, Duration::from_secs(2));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn retry_delay_doubles_then_caps() {
        let config = AutoConnectConfig {
            initial_retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(3),
            ..AutoConnectConfig::default()
        };
        assert_eq!(config.retry_delay(0), Duration::from_millis(500));
        assert_eq!(config.retry_delay(1), Duration::from_secs(1));
        assert_eq!(config.retry_delay(2), Duration::from_secs(2));
        assert_eq!(config.retry_delay(3), Duration::from_secs(3));
        assert_eq!(config.retry_delay(40), Duration::from_secs(3));
    }
}
