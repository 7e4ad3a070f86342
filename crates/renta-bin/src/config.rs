//! Process configuration
//!
//! Loaded from environment variables with sensible defaults; the CLI
//! flags of individual subcommands layer on top of this.

use std::env;
use std::path::PathBuf;

/// Process-level configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding model artifacts and backups
    pub models_dir: PathBuf,
    /// Directory holding the state-store table files
    pub data_dir: PathBuf,
    /// Logging configuration
    pub logging: LogConfig,
}

impl Config {
    /// Load configuration from environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            models_dir: PathBuf::from(
                env::var("RENTA_MODELS_DIR").unwrap_or_else(|_| "./pricing_models".into()),
            ),
            data_dir: PathBuf::from(
                env::var("RENTA_DATA_DIR").unwrap_or_else(|_| "./data".into()),
            ),
            logging: LogConfig::from_env()?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("./pricing_models"),
            data_dir: PathBuf::from("./data"),
            logging: LogConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl LogConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let format = env::var("RENTA_LOG_FORMAT").unwrap_or_else(|_| "pretty".into());
        if format != "json" && format != "pretty" {
            return Err(ConfigError::InvalidValue(format!(
                "RENTA_LOG_FORMAT must be json or pretty, got {:?}",
                format
            )));
        }
        Ok(Self {
            level: env::var("RENTA_LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format,
        })
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

/// Configuration error
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Invalid value
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
