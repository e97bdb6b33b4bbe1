//! Configuration for the matrix builder.

use crate::providers::RetryPolicy;

/// Default number of updates between checkpoints.
pub const DEFAULT_CHECKPOINT_THRESHOLD: usize = 20;

/// Default number of station pairs fetched at once.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Configuration parameters for a build run.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// The matrix is saved once more than this many updates have been
    /// applied since the last save.
    pub checkpoint_threshold: usize,

    /// Maximum number of station pairs with requests in flight.
    /// Per-provider rate limits still apply on top of this.
    pub concurrency: usize,

    /// Retry policy applied to every provider call.
    pub retry: RetryPolicy,
}

impl BuilderConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the checkpoint threshold.
    pub fn with_checkpoint_threshold(mut self, threshold: usize) -> Self {
        self.checkpoint_threshold = threshold;
        self
    }

    /// Set the number of pairs fetched at once. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            checkpoint_threshold: DEFAULT_CHECKPOINT_THRESHOLD,
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }
}
