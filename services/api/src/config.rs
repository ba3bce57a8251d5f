//! services/api/src/config.rs
//!
//! Defines the service's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use reqwest::Url;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where the session collection is kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    /// A single JSON file holding every key.
    File(PathBuf),
    /// A SQLite database reached through `sqlx`.
    Sqlite(String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Base URL of the remote chat and profile endpoints, without a trailing slash.
    pub chat_api_base: String,
    pub storage: StorageBackend,
    pub log_level: Level,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server Settings ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        // --- Remote Chat Endpoint ---
        let chat_api_base =
            lookup("CHAT_API_BASE").unwrap_or_else(|| "http://localhost:8000".to_string());
        Url::parse(&chat_api_base).map_err(|e| {
            ConfigError::InvalidValue("CHAT_API_BASE".to_string(), e.to_string())
        })?;
        let chat_api_base = chat_api_base.trim_end_matches('/').to_string();

        // --- Storage ---
        let storage = match lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) {
            Some(url) if url.starts_with("sqlite:") => StorageBackend::Sqlite(url),
            Some(url) => {
                return Err(ConfigError::InvalidValue(
                    "DATABASE_URL".to_string(),
                    format!("'{}' is not a sqlite: URL", url),
                ))
            }
            None => StorageBackend::File(
                lookup("STORAGE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./chat_state.json")),
            ),
        };

        Ok(Self {
            bind_address,
            chat_api_base,
            storage,
            log_level,
            cors_origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_use_the_json_file_store() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.chat_api_base, "http://localhost:8000");
        assert_eq!(
            config.storage,
            StorageBackend::File(PathBuf::from("./chat_state.json"))
        );
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn base_url_override_drops_trailing_slash() {
        let config =
            Config::from_lookup(lookup(&[("CHAT_API_BASE", "https://chat.example.org/")])).unwrap();
        assert_eq!(config.chat_api_base, "https://chat.example.org");
    }

    #[test]
    fn sqlite_url_selects_the_database_store() {
        let config =
            Config::from_lookup(lookup(&[("DATABASE_URL", "sqlite://chat.db?mode=rwc")])).unwrap();
        assert_eq!(
            config.storage,
            StorageBackend::Sqlite("sqlite://chat.db?mode=rwc".to_string())
        );
    }

    #[test]
    fn invalid_values_are_reported_by_name() {
        let err = Config::from_lookup(lookup(&[("BIND_ADDRESS", "nowhere")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref var, _) if var == "BIND_ADDRESS"));

        let err = Config::from_lookup(lookup(&[("CHAT_API_BASE", "not a url")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref var, _) if var == "CHAT_API_BASE"));

        let err =
            Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://db/chat")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref var, _) if var == "DATABASE_URL"));
    }
}
