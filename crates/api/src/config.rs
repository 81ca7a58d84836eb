use std::time::Duration;

use pictopy_events::HubConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Progress hub tuning.
    pub hub: HubConfig,
}

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                    |
    /// |-------------------------------|----------------------------|
    /// | `HOST`                        | `0.0.0.0`                  |
    /// | `PORT`                        | `3000`                     |
    /// | `CORS_ORIGINS`                | `http://localhost:1420`    |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`       | `30`                       |
    /// | `PROGRESS_RECENT_MAX`         | `1000`                     |
    /// | `PROGRESS_QUEUE_CAPACITY`     | `1024`                     |
    /// | `PROGRESS_PERCENT_DELTA`      | `1`                        |
    /// | `PROGRESS_MIN_INTERVAL_MS`    | `250`                      |
    /// | `PROGRESS_FLUSH_INTERVAL_MS`  | `500`                      |
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_parse("PORT", "u16", 3000)?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:1420".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_parse("REQUEST_TIMEOUT_SECS", "u64", 30)?;
        let shutdown_timeout_secs: u64 = env_parse("SHUTDOWN_TIMEOUT_SECS", "u64", 30)?;

        let defaults = HubConfig::default();
        let hub = HubConfig {
            recent_max: env_parse("PROGRESS_RECENT_MAX", "usize", defaults.recent_max)?,
            queue_capacity: env_parse(
                "PROGRESS_QUEUE_CAPACITY",
                "usize",
                defaults.queue_capacity,
            )?,
            percent_delta: env_parse("PROGRESS_PERCENT_DELTA", "f64", defaults.percent_delta)?,
            min_interval: Duration::from_millis(env_parse(
                "PROGRESS_MIN_INTERVAL_MS",
                "u64",
                defaults.min_interval.as_millis() as u64,
            )?),
            flush_interval: Duration::from_millis(env_parse(
                "PROGRESS_FLUSH_INTERVAL_MS",
                "u64",
                defaults.flush_interval.as_millis() as u64,
            )?),
            ..defaults
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            hub,
        })
    }
}

/// Read `name` from the environment, falling back to `default` when unset.
fn env_parse<T: std::str::FromStr>(
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value,
        }),
        Err(_) => Ok(default),
    }
}
