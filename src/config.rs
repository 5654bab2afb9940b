//! Environment-driven configuration.
//!
//! Every setting has a logged default except the gateway API key, which is
//! optional: without it the server runs, but analysis reports "not configured".

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_PORT: &str = "8080";
pub const DEFAULT_GATEWAY_URL: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";
pub const DEFAULT_GATEWAY_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_GATEWAY_TIMEOUT_SECS: &str = "30";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {key} value '{value}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Home directory not found; set PULSECHECK_DB_PATH")]
    NoDbPath,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub gateway: GatewayConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup. `from_env` passes the process
    /// environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = match lookup("PULSECHECK_DB_PATH").filter(|v| !v.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => {
                let path = crate::db::FeedbackDb::default_path().map_err(|_| ConfigError::NoDbPath)?;
                log::info!("PULSECHECK_DB_PATH not set, using default: {}", path.display());
                path
            }
        };

        let api_key = lookup("AI_GATEWAY_API_KEY").filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            log::warn!("AI_GATEWAY_API_KEY not set; sentiment analysis is disabled");
        }

        Ok(Self {
            port: try_load(&lookup, "PULSECHECK_PORT", DEFAULT_PORT)?,
            db_path,
            gateway: GatewayConfig {
                url: try_load(&lookup, "AI_GATEWAY_URL", DEFAULT_GATEWAY_URL)?,
                model: try_load(&lookup, "AI_GATEWAY_MODEL", DEFAULT_GATEWAY_MODEL)?,
                api_key,
                timeout_secs: try_load(
                    &lookup,
                    "AI_GATEWAY_TIMEOUT_SECS",
                    DEFAULT_GATEWAY_TIMEOUT_SECS,
                )?,
            },
        })
    }
}

fn try_load<F, T>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        log::info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.trim().parse().map_err(|e: T::Err| {
        log::warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key: key.to_string(),
            value,
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_unset() {
        let config =
            Config::from_lookup(lookup_from(&[("PULSECHECK_DB_PATH", "/tmp/pc.db")])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("/tmp/pc.db"));
        assert_eq!(config.gateway.url, DEFAULT_GATEWAY_URL);
        assert_eq!(config.gateway.model, DEFAULT_GATEWAY_MODEL);
        assert_eq!(config.gateway.timeout_secs, 30);
        assert!(config.gateway.api_key.is_none());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = Config::from_lookup(lookup_from(&[
            ("PULSECHECK_DB_PATH", "/data/feedback.db"),
            ("PULSECHECK_PORT", " 9090 "),
            ("AI_GATEWAY_MODEL", "test/model"),
            ("AI_GATEWAY_API_KEY", "sk-test"),
            ("AI_GATEWAY_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.gateway.model, "test/model");
        assert_eq!(config.gateway.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.gateway.timeout_secs, 5);
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[
            ("PULSECHECK_DB_PATH", "/tmp/pc.db"),
            ("PULSECHECK_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "PULSECHECK_PORT"));
    }

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        let config = Config::from_lookup(lookup_from(&[
            ("PULSECHECK_DB_PATH", "/tmp/pc.db"),
            ("AI_GATEWAY_API_KEY", "   "),
        ]))
        .unwrap();
        assert!(config.gateway.api_key.is_none());
    }
}
