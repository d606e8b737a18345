//! Runtime configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::ledger::DEFAULT_NOTIFICATIONS_KEY;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_POLL_MS: u64 = 5000;
pub const DEFAULT_STORE_PATH: &str = "stock-alerts-store.json";
/// Matches the usual browser `localStorage` allowance.
pub const DEFAULT_STORE_QUOTA_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown STOCK_ALERTS_MODE: {0} (expected 'remote' or 'local')")]
    UnknownMode(String),
    #[error("STOCK_ALERTS_POLL_MS must be greater than zero")]
    ZeroPollInterval,
}

/// Where the poller reads notifications from. One per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Poll the API's low-stock endpoint.
    Remote,
    /// Read the local notification ledger.
    Local,
}

impl Mode {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "local" => Ok(Self::Local),
            other => Err(ConfigError::UnknownMode(other.to_owned())),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub mode: Mode,
    pub poll_interval: Duration,
    pub store_path: PathBuf,
    pub store_quota_bytes: usize,
    pub notifications_key: String,
    pub timeouts: HttpTimeouts,
}

impl Config {
    /// Build typed config from environment variables.
    ///
    /// All optional:
    /// - `STOCK_ALERTS_API_URL`: default `http://localhost:5000`
    /// - `STOCK_ALERTS_MODE`: `remote` (default) or `local`
    /// - `STOCK_ALERTS_POLL_MS`: default 5000, must be non-zero
    /// - `STOCK_ALERTS_STORE_PATH`: default `stock-alerts-store.json`
    /// - `STOCK_ALERTS_STORE_QUOTA_BYTES`: default 5 MiB
    /// - `STOCK_ALERTS_NOTIFICATIONS_KEY`: default `notificacoes`
    /// - `STOCK_ALERTS_REQUEST_TIMEOUT_SECS`: default 10
    /// - `STOCK_ALERTS_CONNECT_TIMEOUT_SECS`: default 5
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = match std::env::var("STOCK_ALERTS_MODE") {
            Ok(raw) => Mode::parse(&raw)?,
            Err(_) => Mode::Remote,
        };

        let poll_ms = env_parse("STOCK_ALERTS_POLL_MS", DEFAULT_POLL_MS);
        if poll_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }

        Ok(Self {
            api_url: normalize_base_url(
                &std::env::var("STOCK_ALERTS_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            ),
            mode,
            poll_interval: Duration::from_millis(poll_ms),
            store_path: std::env::var("STOCK_ALERTS_STORE_PATH")
                .map_or_else(|_| PathBuf::from(DEFAULT_STORE_PATH), PathBuf::from),
            store_quota_bytes: env_parse("STOCK_ALERTS_STORE_QUOTA_BYTES", DEFAULT_STORE_QUOTA_BYTES),
            notifications_key: std::env::var("STOCK_ALERTS_NOTIFICATIONS_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| DEFAULT_NOTIFICATIONS_KEY.to_string()),
            timeouts: HttpTimeouts {
                request_secs: env_parse("STOCK_ALERTS_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
                connect_secs: env_parse("STOCK_ALERTS_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            },
        })
    }
}

#[must_use]
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
