use std::str::FromStr;
use std::time::Duration;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `120`). Must exceed the
    /// test-send ceiling.
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Pause between test-send progress checks.
    pub test_poll_interval: Duration,
    /// Hard ceiling on how long a test send is watched.
    pub test_timeout: Duration,
}

/// Read `key`, falling back to `default` when unset.
fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("{key} is invalid: {e}")),
        Err(_) => Ok(default),
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                 |
    /// |------------------------------|-------------------------|
    /// | `HOST`                       | `0.0.0.0`               |
    /// | `PORT`                       | `3000`                  |
    /// | `CORS_ORIGINS`               | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`       | `120`                   |
    /// | `SHUTDOWN_TIMEOUT_SECS`      | `30`                    |
    /// | `PUSH_TEST_POLL_INTERVAL_MS` | `1000`                  |
    /// | `PUSH_TEST_TIMEOUT_SECS`     | `90`                    |
    pub fn from_env() -> Result<Self, String> {
        let host = env_or("HOST", "0.0.0.0".to_string())?;
        let port = env_or("PORT", 3000u16)?;

        let cors_origins: Vec<String> = env_or("CORS_ORIGINS", "http://localhost:5173".to_string())?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = env_or("REQUEST_TIMEOUT_SECS", 120u64)?;
        let shutdown_timeout_secs = env_or("SHUTDOWN_TIMEOUT_SECS", 30u64)?;
        let poll_ms = env_or(
            "PUSH_TEST_POLL_INTERVAL_MS",
            beacon_core::test_send::POLL_INTERVAL.as_millis() as u64,
        )?;
        let test_secs = env_or(
            "PUSH_TEST_TIMEOUT_SECS",
            beacon_core::test_send::POLL_TIMEOUT.as_secs(),
        )?;

        if test_secs >= request_timeout_secs {
            return Err(format!(
                "REQUEST_TIMEOUT_SECS ({request_timeout_secs}) must exceed PUSH_TEST_TIMEOUT_SECS ({test_secs})"
            ));
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            test_poll_interval: Duration::from_millis(poll_ms),
            test_timeout: Duration::from_secs(test_secs),
        })
    }
}
