// Relay server configuration.
//
// Centralizes environment variable parsing with defaults for local
// development.

use std::net::SocketAddr;
use std::time::Duration;

use crate::collab::{registry::DEFAULT_MAX_SESSIONS, session::DEFAULT_MAX_HISTORY, SessionLimits};

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_POLL_TIMEOUT_MS: u64 = 5 * 60 * 1000;
const DEFAULT_PRESENCE_DEBOUNCE_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Core relay server configuration.
///
/// Constructed via [`RelayConfig::from_env`] which reads environment
/// variables and falls back to development defaults.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Listen address (host:port).
    pub listen_addr: SocketAddr,
    /// Comma-separated CORS origins (or `"*"` for any).
    pub cors_origins: Option<String>,
    /// Log filter directive (e.g. `info`, `quire_relay=debug`).
    pub log_filter: String,
    pub log_format: LogFormat,
    /// Live document sessions kept before the least recently active is evicted.
    pub max_sessions: usize,
    pub max_history: usize,
    /// How long a long-poll stays parked without news.
    pub poll_timeout: Duration,
    pub presence_debounce: Duration,
}

impl RelayConfig {
    /// Parse configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `QUIRE_RELAY_HOST` | `0.0.0.0` |
    /// | `QUIRE_RELAY_PORT` | `8000` |
    /// | `QUIRE_RELAY_CORS_ORIGINS` | *(none, cors.rs uses dev defaults)* |
    /// | `QUIRE_RELAY_LOG_FILTER` | `info` |
    /// | `QUIRE_RELAY_LOG_FORMAT` | `text` |
    /// | `QUIRE_RELAY_MAX_SESSIONS` | `20` |
    /// | `QUIRE_RELAY_MAX_HISTORY` | `10000` |
    /// | `QUIRE_RELAY_POLL_TIMEOUT_MS` | `300000` |
    /// | `QUIRE_RELAY_PRESENCE_DEBOUNCE_MS` | `5000` |
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| std::env::var(key))
    }

    /// Testable constructor that accepts an environment lookup function.
    fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let positive = |key: &str, default: u64| -> u64 {
            env(key).ok().and_then(|v| v.trim().parse().ok()).filter(|v| *v > 0).unwrap_or(default)
        };

        let host = env("QUIRE_RELAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env("QUIRE_RELAY_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let listen_addr = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));

        let cors_origins = env("QUIRE_RELAY_CORS_ORIGINS").ok();
        let log_filter = env("QUIRE_RELAY_LOG_FILTER").unwrap_or_else(|_| "info".into());
        let log_format = match env("QUIRE_RELAY_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            listen_addr,
            cors_origins,
            log_filter,
            log_format,
            max_sessions: positive("QUIRE_RELAY_MAX_SESSIONS", DEFAULT_MAX_SESSIONS as u64)
                as usize,
            max_history: positive("QUIRE_RELAY_MAX_HISTORY", DEFAULT_MAX_HISTORY as u64) as usize,
            poll_timeout: Duration::from_millis(positive(
                "QUIRE_RELAY_POLL_TIMEOUT_MS",
                DEFAULT_POLL_TIMEOUT_MS,
            )),
            presence_debounce: Duration::from_millis(positive(
                "QUIRE_RELAY_PRESENCE_DEBOUNCE_MS",
                DEFAULT_PRESENCE_DEBOUNCE_MS,
            )),
        }
    }

    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits { max_history: self.max_history, presence_debounce: self.presence_debounce }
    }
}
