//! Persistence for the station registry and route matrix.
//!
//! The matrix lives in memory while a run is in progress and is written out
//! as a single JSON document at checkpoints and at the end of the run.

mod error;
mod file;
mod matrix;

pub use error::PersistenceError;
pub use file::{MatrixStore, Snapshot, load_document};
pub use matrix::Matrix;
