//! The snapshot file.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::registry::Registry;

use super::error::PersistenceError;
use super::matrix::Matrix;

/// The persisted document: every station and every route.
#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    pub routes: &'a Matrix,
    pub stations: &'a Registry,
}

impl<'a> Snapshot<'a> {
    pub fn new(stations: &'a Registry, routes: &'a Matrix) -> Self {
        Self { routes, stations }
    }

    /// Render the document exactly as it is written to disk.
    ///
    /// Keys are sorted at every level, so equal snapshots render to equal
    /// bytes.
    pub fn render(&self) -> Result<String, serde_json::Error> {
        // Going through `Value` sorts object keys.
        let value = serde_json::to_value(self)?;
        let mut rendered = serde_json::to_string_pretty(&value)?;
        rendered.push('\n');
        Ok(rendered)
    }
}

/// Reads and writes the snapshot document at a fixed path.
#[derive(Debug, Clone)]
pub struct MatrixStore {
    path: PathBuf,
}

impl MatrixStore {
    /// Create a store for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the previous snapshot.
    ///
    /// Returns an empty object if there is no snapshot yet.
    pub fn load(&self) -> Result<Value, PersistenceError> {
        load_document(&self.path)
    }

    /// Load the manual override document at `path`.
    ///
    /// A missing file means no overrides.
    pub fn load_overrides(path: &Path) -> Result<Value, PersistenceError> {
        load_document(path)
    }

    /// Write the snapshot.
    ///
    /// The document is written to a temporary file beside the target and
    /// then renamed over it, so a failed save leaves the previous snapshot
    /// intact. Creates parent directories if they don't exist.
    pub fn save(&self, snapshot: &Snapshot<'_>) -> Result<(), PersistenceError> {
        let rendered = self.render(snapshot)?;
        write_atomically(&self.path, &rendered)
    }

    /// [`save`](Self::save) with the file I/O moved off the async runtime.
    ///
    /// The snapshot is rendered on the calling task, then written on the
    /// blocking thread pool.
    pub async fn save_async(&self, snapshot: &Snapshot<'_>) -> Result<(), PersistenceError> {
        let rendered = self.render(snapshot)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &rendered))
            .await
            .map_err(|e| PersistenceError::Io {
                path: self.path.clone(),
                source: std::io::Error::other(e),
            })?
    }

    fn render(&self, snapshot: &Snapshot<'_>) -> Result<String, PersistenceError> {
        snapshot.render().map_err(|source| PersistenceError::Json {
            path: self.path.clone(),
            source,
        })
    }
}

fn write_atomically(path: &Path, rendered: &str) -> Result<(), PersistenceError> {
    let io_error = |source: std::io::Error| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(io_error)?;
    }

    let mut file = NamedTempFile::new_in(dir).map_err(io_error)?;
    file.write_all(rendered.as_bytes())
        .and_then(|()| file.as_file().sync_all())
        .map_err(io_error)?;

    file.persist(path).map_err(|source| PersistenceError::Persist {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), bytes = rendered.len(), "Saved snapshot");
    Ok(())
}

/// Read a JSON document, treating a missing file as an empty object.
///
/// Used for both the snapshot and the manual override file.
pub fn load_document(path: &Path) -> Result<Value, PersistenceError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No document found, starting empty");
            return Ok(Value::Object(Map::new()));
        }
        Err(source) => {
            return Err(PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_str(&contents).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })
}
