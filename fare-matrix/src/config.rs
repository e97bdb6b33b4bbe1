//! Command-line configuration.
//!
//! Every setting can be given as a flag; the API keys and file paths also
//! fall back to environment variables.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::builder::{BuilderConfig, DEFAULT_CHECKPOINT_THRESHOLD, DEFAULT_CONCURRENCY};
use crate::domain::{InvalidStationCode, StationCode};
use crate::providers::{
    BartConfig, DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES, GraphHopperConfig, RetryPolicy,
};

/// Errors turning command-line arguments into a run configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required API key was not supplied
    #[error("missing {0}: set it in the environment or pass it as a flag")]
    MissingCredential(&'static str),

    /// A setting has an unusable value
    #[error("invalid --{flag}: {reason}")]
    Invalid { flag: &'static str, reason: String },

    /// The reference station is not a valid code
    #[error("invalid --reference-station: {0}")]
    ReferenceStation(#[from] InvalidStationCode),
}

/// Build a table of BART fares and driving times between every pair of
/// stations.
#[derive(Parser, Debug)]
#[command(name = "fare-matrix", version, about)]
pub struct Cli {
    /// BART API key
    #[arg(long, value_name = "KEY", env = "BART_API_KEY", hide_env_values = true)]
    pub bart_api_key: Option<String>,

    /// GraphHopper API key
    #[arg(long, value_name = "KEY", env = "GRAPH_HOPPER_API_KEY", hide_env_values = true)]
    pub graphhopper_api_key: Option<String>,

    /// Snapshot file read at startup and written at checkpoints
    #[arg(long, value_name = "PATH", env = "MATRIX_OUTPUT", default_value = "data.json")]
    pub output: PathBuf,

    /// Manual override file merged over the snapshot
    #[arg(long, value_name = "PATH", env = "MATRIX_MANUAL", default_value = "manual.json")]
    pub manual: PathBuf,

    /// Save progress after this many updates
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CHECKPOINT_THRESHOLD)]
    pub checkpoint_threshold: usize,

    /// Minimum delay between calls to the same API, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 250)]
    pub call_delay_ms: u64,

    /// Number of station pairs fetched at once
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Retries for a failed call before leaving the field empty
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds; later retries double it
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_BASE_DELAY.as_millis() as u64)]
    pub retry_delay_ms: u64,

    /// HTTP request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Station whose presence in the snapshot means the directory need not
    /// be fetched
    #[arg(long, value_name = "CODE", default_value = "12TH")]
    pub reference_station: String,

    /// Don't draw a progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bart: BartConfig,
    pub graphhopper: GraphHopperConfig,
    pub builder: BuilderConfig,
    pub output: PathBuf,
    pub manual: PathBuf,
    pub reference_station: StationCode,
    pub show_progress: bool,
}

impl Config {
    /// Validate parsed arguments.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let bart_key = credential(cli.bart_api_key, "BART_API_KEY")?;
        let graphhopper_key = credential(cli.graphhopper_api_key, "GRAPH_HOPPER_API_KEY")?;

        if cli.concurrency == 0 {
            return Err(ConfigError::Invalid {
                flag: "concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if cli.checkpoint_threshold == 0 {
            return Err(ConfigError::Invalid {
                flag: "checkpoint-threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        if cli.retry_delay_ms == 0 {
            return Err(ConfigError::Invalid {
                flag: "retry-delay-ms",
                reason: "must be at least 1".to_string(),
            });
        }
        if cli.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                flag: "timeout-secs",
                reason: "must be at least 1".to_string(),
            });
        }

        let reference_station = StationCode::parse(&cli.reference_station)?;
        let call_delay = Duration::from_millis(cli.call_delay_ms);

        // Each client must admit every pair the builder has in flight.
        let bart = BartConfig::new(bart_key)
            .with_call_delay(call_delay)
            .with_max_concurrent(cli.concurrency)
            .with_timeout(cli.timeout_secs);
        let graphhopper = GraphHopperConfig::new(graphhopper_key)
            .with_call_delay(call_delay)
            .with_max_concurrent(cli.concurrency)
            .with_timeout(cli.timeout_secs);

        let builder = BuilderConfig::new()
            .with_checkpoint_threshold(cli.checkpoint_threshold)
            .with_concurrency(cli.concurrency)
            .with_retry(
                RetryPolicy::new(cli.max_retries)
                    .with_base_delay(Duration::from_millis(cli.retry_delay_ms)),
            );

        Ok(Self {
            bart,
            graphhopper,
            builder,
            output: cli.output,
            manual: cli.manual,
            reference_station,
            show_progress: !cli.no_progress,
        })
    }
}

fn credential(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ConfigError::MissingCredential(name)),
    }
}
