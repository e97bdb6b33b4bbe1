use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use fare_matrix::Error;
use fare_matrix::builder::{
    BarProgress, BuildSummary, MatrixBuilder, NoProgress, Progress, Providers,
};
use fare_matrix::config::{Cli, Config};
use fare_matrix::document::deep_merge;
use fare_matrix::providers::{BartClient, GraphHopperClient};
use fare_matrix::registry::Registry;
use fare_matrix::store::{Matrix, MatrixStore};

/// Exit status after Ctrl-C, as a shell reports SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    // Loaded first so `.env` can also set RUST_LOG.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => {
            error!(error = %e, "Could not load .env file");
            return ExitCode::FAILURE;
        }
    }

    let config = match Config::from_cli(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut matrix = Matrix::new();
    let mut registry = Registry::default();

    match run(&config, &mut registry, &mut matrix).await {
        Ok(summary) if summary.interrupted => {
            warn!(unresolved = summary.unresolved, "Interrupted, progress saved");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Ok(summary) => {
            info!(
                path = %config.output.display(),
                unresolved = summary.unresolved,
                "Matrix saved"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            if !registry.is_empty() {
                error!(
                    unresolved = matrix.unresolved_count(&registry),
                    "Edges still unresolved"
                );
            }
            ExitCode::FAILURE
        }
    }
}

/// Load everything, then build. `registry` and `matrix` are filled in as
/// they become available so the caller can report on them after a failure.
async fn run(
    config: &Config,
    registry: &mut Registry,
    matrix: &mut Matrix,
) -> Result<BuildSummary, Error> {
    let bart = BartClient::new(config.bart.clone())?;
    let graphhopper = GraphHopperClient::new(config.graphhopper.clone())?;

    let store = MatrixStore::new(&config.output);
    let snapshot = store.load()?;
    let manual = MatrixStore::load_overrides(&config.manual)?;

    *registry = Registry::build(&manual, &snapshot, &bart, &config.reference_station).await?;
    info!(stations = registry.len(), pairs = registry.pair_count(), "Registry ready");

    let mut document = snapshot;
    deep_merge(&mut document, manual);
    *matrix = Matrix::from_document(&document)?;

    let inserted = matrix.ensure_complete(registry);
    let reconciled = matrix.reconcile_fares();
    info!(
        edges = matrix.len(),
        inserted,
        reconciled,
        unresolved = matrix.unresolved_count(registry),
        "Matrix loaded"
    );

    let providers = Providers::new(bart, graphhopper);
    let builder = MatrixBuilder::new(config.builder.clone());

    let progress: Box<dyn Progress> = if config.show_progress {
        Box::new(BarProgress::new())
    } else {
        Box::new(NoProgress)
    };

    builder
        .run(
            registry,
            matrix,
            &providers,
            &store,
            progress.as_ref(),
            shutdown_signal(),
        )
        .await
}

/// Resolves on Ctrl-C. Never resolves if the handler can't be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
