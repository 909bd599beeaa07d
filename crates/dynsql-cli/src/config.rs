//! Configuration system for the dynsql shell
//!
//! Loads configuration from:
//! 1. config.yaml - operational settings (connect string, limits, output, logging)
//! 2. .env file - secrets (the session password)
//!
//! Environment variables always override config.yaml values.

use dynsql_core::{Credentials, CursorOptions};
use dynsql_duck::DuckOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Connect string: `user[/password][@database]`
    pub connect: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect: "scott@:memory:".to_string(),
        }
    }
}

/// How fetched rows are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Select-list table, one block per record, then a summary line
    Records,
    /// One JSON object per row, then a JSON summary
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "records" => Some(OutputFormat::Records),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Records,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: console, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
            output: "console".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub cursor: CursorOptions,
    pub engine: DuckOptions,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.apply_env();
        Ok(config)
    }

    /// Like [`Config::load`], falling back to defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            return Self::load(path);
        }

        let mut config = Config::default();
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(connect) = std::env::var("DYNSQL_CONNECT") {
            self.session.connect = connect;
        }

        if let Ok(max_columns) = std::env::var("DYNSQL_MAX_COLUMNS") {
            if let Ok(max_columns) = max_columns.parse() {
                self.cursor.max_columns = max_columns;
            }
        }
        if let Ok(text_length) = std::env::var("DYNSQL_TEXT_LENGTH") {
            if let Ok(text_length) = text_length.parse() {
                self.engine.text_length = text_length;
            }
        }

        if let Ok(format) = std::env::var("DYNSQL_OUTPUT_FORMAT") {
            if let Some(format) = OutputFormat::parse(&format) {
                self.output.format = format;
            }
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }
    }

    /// Session password from the environment (kept out of config.yaml)
    pub fn password_from_env() -> Option<String> {
        std::env::var("DYNSQL_PASSWORD").ok()
    }

    /// Credentials from the connect string, with the password taken from
    /// `DYNSQL_PASSWORD` when set
    pub fn credentials(&self) -> Credentials {
        let credentials = Credentials::parse(&self.session.connect);
        match Self::password_from_env() {
            Some(password) => credentials.with_password(password),
            None => credentials,
        }
    }

    /// Set logging environment variables for the logging module
    pub fn apply_logging_env(&self) {
        std::env::set_var("RUST_LOG", &self.logging.level);
        std::env::set_var("LOG_FORMAT", &self.logging.format);
        std::env::set_var("LOG_OUTPUT", &self.logging.output);
        std::env::set_var("LOG_DIR", &self.logging.directory);
    }
}
