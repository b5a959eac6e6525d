//! Server configuration loading from file and environment variables.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use quill_db::{ConnectionSettings, SchemaSource};
use serde::Deserialize;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Busy timeout for SQLite sessions, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Optional path to a schema script that replaces the bundled one for
    /// the `init-db` command.
    #[serde(default)]
    pub schema: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "quill_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

impl DatabaseConfig {
    /// The per-request connection settings this configuration describes.
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            path: self.path.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
        }
    }

    /// The schema source for the bootstrap command.
    pub fn schema_source(&self) -> SchemaSource {
        match &self.schema {
            Some(path) => SchemaSource::Path(PathBuf::from(path)),
            None => SchemaSource::Embedded,
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "quill.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            schema: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `QUILL_HOST` overrides `server.host`
/// - `QUILL_PORT` overrides `server.port`
/// - `QUILL_DB_PATH` overrides `database.path`
/// - `QUILL_SCHEMA_PATH` overrides `database.schema`
/// - `QUILL_LOG_LEVEL` overrides `logging.level`
/// - `QUILL_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("QUILL_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("QUILL_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("QUILL_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(schema) = std::env::var("QUILL_SCHEMA_PATH") {
        config.database.schema = Some(schema);
    }
    if let Ok(level) = std::env::var("QUILL_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("QUILL_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_config() {
        let config: Config = toml::from_str("").expect("empty config should parse");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.path, "quill.db");
        assert!(config.database.schema.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_config_overrides_only_named_fields() {
        let config: Config = toml::from_str(
            r#"
            [database]
            path = "/var/lib/quill/quill.db"
            schema = "/etc/quill/schema.sql"
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.database.path, "/var/lib/quill/quill.db");
        assert!(matches!(
            config.database.schema_source(),
            SchemaSource::Path(_)
        ));
        // Untouched sections keep their defaults.
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.busy_timeout_ms, 5_000);
    }

    #[test]
    fn connection_settings_mirror_the_database_section() {
        let config = Config::default();
        let settings = config.database.connection_settings();
        assert_eq!(settings.path, "quill.db");
        assert_eq!(settings.busy_timeout_ms, 5_000);
    }
}
