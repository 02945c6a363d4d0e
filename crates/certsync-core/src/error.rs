use crate::{config::ConfigError, dto::read::ReadError};
use thiserror::Error as ThisError;

///
/// Error
///
/// Crate-level error envelope.
///
/// `sync` itself never fails. This type surfaces from `DualReader::fetch`
/// and from `SyncFacade::from_toml`.
///

#[derive(Debug, ThisError)]
#[remain::sorted]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Read(#[from] ReadError),
}

impl Error {
    /// True when the failure came from a backend read rather than local setup.
    #[must_use]
    pub const fn is_read(&self) -> bool {
        matches!(self, Self::Read(_))
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_errors_convert_transparently() {
        let err: Error = ReadError::transport("connection reset").into();

        assert!(err.is_read());
        assert_eq!(err.to_string(), "transport error: connection reset");
    }

    #[test]
    fn config_errors_are_not_reads() {
        let err: Error = ConfigError::CannotParseToml("bad".to_string()).into();

        assert!(!err.is_read());
        assert_eq!(err.to_string(), "toml error: bad");
    }
}
