use super::{ConfigSchemaError, Validate};
use crate::log::Level;
use serde::{Deserialize, Serialize};

///
/// Defaults
///

mod defaults {
    use crate::log::Level;

    pub const fn max_entries() -> u64 {
        1_000
    }

    pub const fn max_entry_bytes() -> u32 {
        4_096
    }

    pub const fn min_level() -> Level {
        Level::Debug
    }

    pub const fn echo() -> bool {
        false
    }
}

pub const MAX_LOG_ENTRIES: u64 = 100_000;

///
/// LogConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    #[serde(default = "defaults::max_entries")]
    pub max_entries: u64,

    #[serde(default = "defaults::max_entry_bytes")]
    pub max_entry_bytes: u32,

    #[serde(default = "defaults::min_level")]
    pub min_level: Level,

    /// Print each retained entry to stderr as well.
    #[serde(default = "defaults::echo")]
    pub echo: bool,
}

impl LogConfig {
    pub const DEFAULT: Self = Self {
        max_entries: defaults::max_entries(),
        max_entry_bytes: defaults::max_entry_bytes(),
        min_level: defaults::min_level(),
        echo: defaults::echo(),
    };
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Validate for LogConfig {
    fn validate(&self) -> Result<(), ConfigSchemaError> {
        if self.max_entries > MAX_LOG_ENTRIES {
            return Err(ConfigSchemaError::ValidationError(format!(
                "log.max_entries {} exceeds max {}",
                self.max_entries, MAX_LOG_ENTRIES
            )));
        }

        if self.max_entry_bytes == 0 {
            return Err(ConfigSchemaError::ValidationError(
                "log.max_entry_bytes must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
