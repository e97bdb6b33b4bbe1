//! Crate-level error type.

use crate::config::ConfigError;
use crate::document::DocumentError;
use crate::providers::ProviderError;
use crate::store::PersistenceError;

/// Any error that can end a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Provider failed in a way retrying will not fix
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Snapshot could not be read or written
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Snapshot or override document has an unexpected shape
    #[error("document error: {0}")]
    Document(#[from] DocumentError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err: Error = ConfigError::MissingCredential("BART_API_KEY").into();
        assert_eq!(
            err.to_string(),
            "configuration error: missing BART_API_KEY: set it in the environment or pass it as a flag"
        );

        let err: Error = ProviderError::Unauthorized { provider: "bart" }.into();
        assert_eq!(
            err.to_string(),
            "provider error: unauthorized by bart: check the API key"
        );

        let err: Error = DocumentError::NotAnObject("routes").into();
        assert_eq!(
            err.to_string(),
            "document error: expected `routes` to be an object"
        );
    }
}
