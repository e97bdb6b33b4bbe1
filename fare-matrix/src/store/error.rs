//! Persistence error types.

use std::path::PathBuf;

/// Errors reading or writing the snapshot and override files.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Filesystem operation failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid JSON, or the snapshot could not be serialized
    #[error("JSON error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Replacing the snapshot with the freshly written file failed
    #[error("failed to replace {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}
