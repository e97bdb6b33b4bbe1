//! Progress reporting for build runs.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str = "{prefix:>12.bold.cyan} [{bar:25}] {pos}/{len} pairs ({eta})";

/// Receives progress updates from the builder.
pub trait Progress {
    /// Set the total number of ordered pairs.
    fn set_total(&self, total: u64);

    /// Mark `pairs` more ordered pairs as visited.
    fn advance(&self, pairs: u64);

    /// Called once the run ends, whatever the outcome.
    fn finish(&self);
}

/// A terminal progress bar drawn on stderr.
#[derive(Debug, Clone)]
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    /// Create a progress bar. It stays hidden until a total is set.
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        let style = ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_prefix("Fetching");
        Self { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for BarProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
    }

    fn advance(&self, pairs: u64) {
        self.bar.inc(pairs);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Discards all progress updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn set_total(&self, _total: u64) {}

    fn advance(&self, _pairs: u64) {}

    fn finish(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_tracks_position() {
        let progress = BarProgress::new();
        progress.set_total(6);
        progress.bar.set_draw_target(ProgressDrawTarget::hidden());

        progress.advance(2);
        progress.advance(2);

        assert_eq!(progress.bar.position(), 4);
        assert_eq!(progress.bar.length(), Some(6));

        progress.finish();
        assert!(progress.bar.is_finished());
    }
}
