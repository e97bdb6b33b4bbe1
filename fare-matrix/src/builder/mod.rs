//! Matrix builder.
//!
//! Walks every pair of registry stations and fetches the fares and driving
//! metrics the matrix does not have yet, saving progress as it goes so an
//! interrupted run can pick up where it stopped.

mod build;
mod config;
mod progress;


pub use build::{BuildSummary, MatrixBuilder, Providers};
pub use config::{BuilderConfig, DEFAULT_CHECKPOINT_THRESHOLD, DEFAULT_CONCURRENCY};
pub use progress::{BarProgress, NoProgress, Progress};
