pub mod schema;

use crate::{log, log::Topic, model::log::Log};
use schema::{ConfigSchemaError, Validate};
use thiserror::Error as ThisError;

pub use schema::{ConfigModel, LogConfig, SyncConfig};

///
/// ConfigError
/// Errors related to configuration parsing and validation.
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    /// TOML could not be parsed into the expected structure.
    #[error("toml error: {0}")]
    CannotParseToml(String),

    /// Wrapper for data schema-level errors.
    #[error(transparent)]
    ConfigSchema(#[from] ConfigSchemaError),
}

///
/// Config
///
/// There is no process-wide config: callers parse a `ConfigModel` once and
/// hand it to whatever they construct (usually a `SyncFacade`). The only
/// global it touches is the log, which is ambient.
///

pub struct Config;

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml(config_str: &str) -> Result<ConfigModel, ConfigError> {
        let config: ConfigModel =
            toml::from_str(config_str).map_err(|e| ConfigError::CannotParseToml(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document and apply its `[log]` section to the global log.
    pub fn load(config_str: &str) -> Result<ConfigModel, ConfigError> {
        let config = Self::from_toml(config_str)?;
        Log::configure(config.log.clone());

        log!(
            Topic::Config,
            Info,
            "config loaded: default_strategy={} force_strategy={}",
            config.sync.default_strategy,
            config
                .sync
                .force_strategy
                .map_or_else(|| "none".to_string(), |s| s.to_string()),
        );

        Ok(config)
    }

    /// Return a config model as a TOML string.
    pub fn to_toml(config: &ConfigModel) -> Result<String, ConfigError> {
        toml::to_string_pretty(config).map_err(|e| ConfigError::CannotParseToml(e.to_string()))
    }
}

///
/// TESTS
///
