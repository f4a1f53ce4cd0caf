//! Server configuration
//!
//! ServerConfig is read once from the environment at startup and is
//! immutable for the lifetime of the process.
//!
//! # Environment Variables
//!
//! - `MENUTREE_HOST`: Bind address (default: 127.0.0.1)
//! - `MENUTREE_PORT`: Server port (default: 3001)
//! - `MENUTREE_DB_PATH`: Database file (default: ~/.menutree/menutree.db)
//! - `MENUTREE_DEFAULT_MAX_DEPTH`: Depth limit for new trees (default: 3)
//! - `MENUTREE_RESOURCES_FILE`: JSON file for the static resource resolver
//! - `MENUTREE_CORS_ORIGIN`: Allowed browser origin (default: none)

use axum::http::HeaderValue;
use menutree_core::models::DEFAULT_MAX_DEPTH;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3001;

/// Configuration errors, raised before anything is started
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable holds an unusable value
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// No database path given and no home directory to derive one from
    #[error("Failed to determine home directory for the default database path")]
    NoHomeDirectory,
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl ToString) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Runtime server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub default_max_depth: u32,
    pub resources_file: Option<PathBuf>,
    pub cors_origin: Option<HeaderValue>,
}

impl ServerConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to its value
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let host = var("MENUTREE_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match var("MENUTREE_PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::invalid("MENUTREE_PORT", &value, e))?,
            None => DEFAULT_PORT,
        };

        let db_path = match var("MENUTREE_DB_PATH") {
            Some(value) => PathBuf::from(value),
            None => default_db_path()?,
        };

        let default_max_depth = match var("MENUTREE_DEFAULT_MAX_DEPTH") {
            Some(value) => {
                let depth = value
                    .trim()
                    .parse::<u32>()
                    .map_err(|e| ConfigError::invalid("MENUTREE_DEFAULT_MAX_DEPTH", &value, e))?;
                if depth == 0 {
                    return Err(ConfigError::invalid(
                        "MENUTREE_DEFAULT_MAX_DEPTH",
                        &value,
                        "must be at least 1",
                    ));
                }
                depth
            }
            None => DEFAULT_MAX_DEPTH,
        };

        let resources_file = var("MENUTREE_RESOURCES_FILE").map(PathBuf::from);

        let cors_origin = match var("MENUTREE_CORS_ORIGIN") {
            Some(value) => Some(
                value
                    .parse::<HeaderValue>()
                    .map_err(|e| ConfigError::invalid("MENUTREE_CORS_ORIGIN", &value, e))?,
            ),
            None => None,
        };

        Ok(Self {
            host,
            port,
            db_path,
            default_max_depth,
            resources_file,
            cors_origin,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// ~/.menutree/menutree.db
fn default_db_path() -> Result<PathBuf, ConfigError> {
    let home_dir = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
    Ok(home_dir.join(".menutree").join("menutree.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_explicit_values() {
        let config = config_from(&[
            ("MENUTREE_PORT", "8080"),
            ("MENUTREE_DB_PATH", "/tmp/menus.db"),
            ("MENUTREE_DEFAULT_MAX_DEPTH", "5"),
            ("MENUTREE_RESOURCES_FILE", "/etc/menutree/resources.json"),
            ("MENUTREE_CORS_ORIGIN", "http://localhost:5173"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("/tmp/menus.db"));
        assert_eq!(config.default_max_depth, 5);
        assert_eq!(
            config.resources_file,
            Some(PathBuf::from("/etc/menutree/resources.json"))
        );
        assert_eq!(
            config.cors_origin,
            Some(HeaderValue::from_static("http://localhost:5173"))
        );
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("MENUTREE_DB_PATH", "menus.db"), ("MENUTREE_PORT", " ")])
            .unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.default_max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.resources_file.is_none());
        assert!(config.cors_origin.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = config_from(&[("MENUTREE_DB_PATH", "x.db"), ("MENUTREE_PORT", "http")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MENUTREE_PORT"));

        let err = config_from(&[
            ("MENUTREE_DB_PATH", "x.db"),
            ("MENUTREE_DEFAULT_MAX_DEPTH", "0"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "MENUTREE_DEFAULT_MAX_DEPTH"
        ));
    }
}
