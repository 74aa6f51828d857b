//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `DATABASE_URL` — PostgreSQL URL; unset runs the in-memory registry
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `VERIFY_TTL_SECS` — verification-code lifetime (default: `300`)
/// - `VERIFY_SWEEP_SECS` — cache eviction period (default: `60`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub log_level: String,
    pub verify_ttl: Duration,
    pub verify_sweep: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            database_url: std::env::var("DATABASE_URL").ok(),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            verify_ttl: duration_from_env("VERIFY_TTL_SECS", 300),
            verify_sweep: duration_from_env("VERIFY_SWEEP_SECS", 60),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn duration_from_env(name: &str, default_secs: u64) -> Duration {
    let secs = std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            log_level: "info".to_string(),
            verify_ttl: Duration::from_secs(300),
            verify_sweep: Duration::from_secs(60),
        }
    }
}
