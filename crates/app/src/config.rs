//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::RetryPolicy;

/// Server and workflow configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `PAYMENT_WINDOW_SECS`: time an order has to be paid (default: `900`)
/// - `COMMAND_MAX_ATTEMPTS`: attempts per command on version conflicts (default: `3`)
/// - `SCHEDULED_RETRY_SECS`: delay before a failed scheduled command is
///   delivered again (default: `5`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub payment_window: Duration,
    pub command_max_attempts: u32,
    pub scheduled_retry_delay: Duration,
}

const DEFAULT_PAYMENT_WINDOW_SECS: u64 = 15 * 60;
const DEFAULT_COMMAND_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_SCHEDULED_RETRY_SECS: u64 = 5;

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            payment_window: lookup("PAYMENT_WINDOW_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.payment_window),
            command_max_attempts: lookup("COMMAND_MAX_ATTEMPTS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.command_max_attempts),
            scheduled_retry_delay: lookup("SCHEDULED_RETRY_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.scheduled_retry_delay),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.command_max_attempts)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            payment_window: Duration::from_secs(DEFAULT_PAYMENT_WINDOW_SECS),
            command_max_attempts: DEFAULT_COMMAND_MAX_ATTEMPTS,
            scheduled_retry_delay: Duration::from_secs(DEFAULT_SCHEDULED_RETRY_SECS),
        }
    }
}
