use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use axum::http::HeaderValue;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    /// `None` allows any origin.
    pub cors_origin: Option<HeaderValue>,
    pub notify_webhook_url: Option<String>,
    pub notify_webhook_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            redis_url: "redis://redis:6379".to_string(),
            cors_origin: None,
            notify_webhook_url: None,
            notify_webhook_key: None,
            request_timeout: Duration::from_millis(5000),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let timeout_ms: u64 = try_load("REQUEST_TIMEOUT_MS", "5000")?;

        Ok(Self {
            port: try_load("RUST_PORT", "8080")?,
            redis_url: try_load("REDIS_URL", "redis://redis:6379")?,
            cors_origin: parse_origin(&try_load::<String>("CORS_ORIGIN", "*")?)?,
            notify_webhook_url: var("NOTIFY_WEBHOOK_URL").ok(),
            notify_webhook_key: read_secret("NOTIFY_WEBHOOK_KEY"),
            request_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        info!("Environment variable {key} not found");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })
}

fn parse_origin(origin: &str) -> Result<Option<HeaderValue>, ConfigError> {
    if origin == "*" {
        return Ok(None);
    }

    HeaderValue::from_str(origin)
        .map(Some)
        .map_err(|e| ConfigError::Invalid {
            key: "CORS_ORIGIN".to_string(),
            reason: e.to_string(),
        })
}

/// Docker secret first, then the environment.
fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("Failed to read {secret_name} from file: {e}");
        })
        .or_else(|_| var(secret_name))
        .ok()
        .filter(|s| !s.is_empty())
}
