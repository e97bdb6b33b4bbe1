//! Incremental construction of the route matrix.
//!
//! Work is split into units of unordered station pairs `{a, b}` with
//! `a < b`. A unit fetches driving metrics for whichever of `a → b` and
//! `b → a` lack them, and the fare for the pair if either direction lacks
//! it. Since a fare is only ever fetched by the unit owning its pair, two
//! requests for the same fare can never be in flight at once.
//!
//! Units run through a bounded `buffer_unordered` pool on the calling task.
//! Their results are applied by the driving loop, which is the only writer
//! of the matrix and the only place checkpoints are saved from.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use tracing::{debug, info, warn};

use super::config::BuilderConfig;
use super::progress::Progress;
use crate::domain::{CarMetrics, Coordinates, Fare, StationCode};
use crate::error::Error;
use crate::providers::{FareProvider, ProviderError, RetryPolicy, RouteProvider};
use crate::registry::Registry;
use crate::store::{Matrix, MatrixStore, PersistenceError, Snapshot};

/// The providers a build run fetches from.
///
/// Each is held in an `Arc` so every retry attempt can own a handle.
#[derive(Debug)]
pub struct Providers<F, R> {
    pub fares: Arc<F>,
    pub routes: Arc<R>,
}

impl<F: FareProvider, R: RouteProvider> Providers<F, R> {
    pub fn new(fares: F, routes: R) -> Self {
        Self {
            fares: Arc::new(fares),
            routes: Arc::new(routes),
        }
    }
}

/// What a build run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Ordered pairs of distinct stations, n·(n−1).
    pub pairs_total: usize,

    /// Ordered pairs whose edge was inspected and, where needed, fetched.
    pub pairs_visited: usize,

    /// Fields written: one per direction for driving metrics, one per
    /// pair for a fare.
    pub updates: usize,

    /// Fetches that still failed after retrying. The fields stay empty and
    /// are retried on the next run.
    pub failures: usize,

    /// Intermediate saves, not counting the final one.
    pub checkpoints: usize,

    /// Whether the run was stopped by the shutdown signal.
    pub interrupted: bool,

    /// Edges still missing at least one field at the end of the run.
    pub unresolved: usize,
}

/// Fills in the missing fields of a route matrix.
#[derive(Debug, Clone, Default)]
pub struct MatrixBuilder {
    config: BuilderConfig,
}

impl MatrixBuilder {
    /// Create a builder with the given configuration.
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    /// Visit every pair of registry stations, fetch whatever is missing and
    /// save the result.
    ///
    /// The matrix should already hold an edge for every pair (see
    /// [`Matrix::ensure_complete`]). The matrix is saved whenever more than
    /// the configured number of updates have accumulated, and once more at
    /// the end. If `shutdown` resolves first, in-flight fetches are dropped,
    /// the matrix is saved and the summary is marked as interrupted.
    ///
    /// Fetches failing permanently (bad credentials, malformed responses)
    /// end the run with an error once the matrix has been saved. A failed
    /// save also ends the run. `progress` is finished on every path.
    pub async fn run<F, R, P, S>(
        &self,
        registry: &Registry,
        matrix: &mut Matrix,
        providers: &Providers<F, R>,
        store: &MatrixStore,
        progress: &P,
        shutdown: S,
    ) -> Result<BuildSummary, Error>
    where
        F: FareProvider + 'static,
        R: RouteProvider + 'static,
        P: Progress + ?Sized,
        S: Future<Output = ()>,
    {
        let mut writer = Writer {
            registry,
            store,
            threshold: self.config.checkpoint_threshold,
            since_checkpoint: 0,
            summary: BuildSummary {
                pairs_total: registry.pair_count(),
                ..BuildSummary::default()
            },
        };

        progress.set_total(writer.summary.pairs_total as u64);

        let units = plan(registry, matrix);
        let idle = registry.pair_count() / 2 - units.len();
        writer.summary.pairs_visited = idle * 2;
        progress.advance((idle * 2) as u64);

        info!(
            stations = registry.len(),
            pairs = writer.summary.pairs_total,
            pending_units = units.len(),
            concurrency = self.config.concurrency,
            "Starting build"
        );

        let retry = &self.config.retry;
        let pending = stream::iter(units)
            .map(|unit| unit.fetch(providers, retry))
            .buffer_unordered(self.config.concurrency);

        let result = apply_outcomes(&mut writer, matrix, pending, progress, shutdown).await;
        progress.finish();

        if let Err(e) = result {
            if matches!(e, Error::Provider(_)) {
                writer.save(matrix).await?;
                warn!(
                    unresolved = matrix.unresolved_count(registry),
                    "Aborting build after a permanent provider failure"
                );
            }
            return Err(e);
        }

        writer.save(matrix).await?;

        let mut summary = writer.summary;
        summary.unresolved = matrix.unresolved_count(registry);

        info!(
            visited = summary.pairs_visited,
            updates = summary.updates,
            failures = summary.failures,
            checkpoints = summary.checkpoints,
            unresolved = summary.unresolved,
            interrupted = summary.interrupted,
            "Build finished"
        );

        Ok(summary)
    }
}

/// Apply unit results as they complete until the units run out, shutdown
/// is requested, a save fails or a fetch fails permanently.
async fn apply_outcomes<U, P, S>(
    writer: &mut Writer<'_>,
    matrix: &mut Matrix,
    pending: U,
    progress: &P,
    shutdown: S,
) -> Result<(), Error>
where
    U: futures::Stream<Item = Outcome>,
    P: Progress + ?Sized,
    S: Future<Output = ()>,
{
    let mut pending = pin!(pending);
    let mut shutdown = pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            () = &mut shutdown => {
                warn!("Shutdown requested, saving progress");
                writer.summary.interrupted = true;
                return Ok(());
            }

            next = pending.next() => {
                let Some(outcome) = next else { return Ok(()) };
                let fatal = writer.apply(matrix, outcome).await?;
                progress.advance(2);

                if let Some(e) = fatal {
                    return Err(e.into());
                }
            }
        }
    }
}

/// Collect the units with at least one field to fetch, in code order.
fn plan(registry: &Registry, matrix: &Matrix) -> Vec<Unit> {
    let needs_car = |orig: &StationCode, dest: &StationCode| {
        matrix.get(orig, dest).is_none_or(|edge| edge.needs_car_metrics())
    };
    let needs_fare = |orig: &StationCode, dest: &StationCode| {
        matrix.get(orig, dest).is_none_or(|edge| edge.needs_fare())
    };

    let mut units = Vec::new();

    for (a, station_a) in registry.iter() {
        for (b, station_b) in registry.iter().filter(|(b, _)| *b > a) {
            let unit = Unit {
                a: a.clone(),
                b: b.clone(),
                a_at: station_a.coordinates(),
                b_at: station_b.coordinates(),
                fare: needs_fare(a, b) || needs_fare(b, a),
                forward: needs_car(a, b),
                reverse: needs_car(b, a),
            };

            if unit.fare || unit.forward || unit.reverse {
                units.push(unit);
            }
        }
    }

    units
}

/// An unordered pair of stations and which of its fields need fetching.
#[derive(Debug, Clone)]
struct Unit {
    a: StationCode,
    b: StationCode,
    a_at: Coordinates,
    b_at: Coordinates,
    fare: bool,
    forward: bool,
    reverse: bool,
}

impl Unit {
    /// Fetch everything the unit needs, one call at a time.
    ///
    /// Stops at the first permanent failure; nothing else the unit would
    /// fetch can be trusted to succeed.
    async fn fetch<F, R>(self, providers: &Providers<F, R>, retry: &RetryPolicy) -> Outcome
    where
        F: FareProvider + 'static,
        R: RouteProvider + 'static,
    {
        let mut outcome = Outcome::default();

        if self.fare {
            let input = (Arc::clone(&providers.fares), self.a.clone(), self.b.clone());
            let result = retry
                .run("fare", input, |(fares, a, b): (Arc<F>, StationCode, StationCode)| async move {
                    fares.fare(&a, &b).await
                })
                .await;
            let stop = is_permanent(&result);
            outcome.fare = Some(result);
            if stop {
                return outcome.with_unit(self);
            }
        }

        if self.forward {
            let result = drive_route(providers, retry, self.a_at, self.b_at).await;
            let stop = is_permanent(&result);
            outcome.forward = Some(result);
            if stop {
                return outcome.with_unit(self);
            }
        }

        if self.reverse {
            outcome.reverse = Some(drive_route(providers, retry, self.b_at, self.a_at).await);
        }

        outcome.with_unit(self)
    }
}

async fn drive_route<F, R>(
    providers: &Providers<F, R>,
    retry: &RetryPolicy,
    from: Coordinates,
    to: Coordinates,
) -> Result<CarMetrics, ProviderError>
where
    R: RouteProvider + 'static,
{
    let input = (Arc::clone(&providers.routes), from, to);
    retry
        .run("route", input, |(routes, from, to): (Arc<R>, Coordinates, Coordinates)| async move {
            routes.drive(from, to).await
        })
        .await
}

/// Results of one unit. `None` means the field was not fetched.
#[derive(Debug, Default)]
struct Outcome {
    unit: Option<Unit>,
    fare: Option<Result<Fare, ProviderError>>,
    forward: Option<Result<CarMetrics, ProviderError>>,
    reverse: Option<Result<CarMetrics, ProviderError>>,
}

impl Outcome {
    fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }
}

fn is_permanent<T>(result: &Result<T, ProviderError>) -> bool {
    matches!(result, Err(e) if !e.is_transient())
}

/// The single writer of the matrix during a run.
struct Writer<'a> {
    registry: &'a Registry,
    store: &'a MatrixStore,
    threshold: usize,
    since_checkpoint: usize,
    summary: BuildSummary,
}

impl Writer<'_> {
    /// Apply a unit's results.
    ///
    /// Returns the first permanent failure, if any, after applying
    /// everything that succeeded.
    async fn apply(
        &mut self,
        matrix: &mut Matrix,
        outcome: Outcome,
    ) -> Result<Option<ProviderError>, PersistenceError> {
        let Outcome {
            unit,
            fare,
            forward,
            reverse,
        } = outcome;
        let Some(unit) = unit else {
            return Ok(None);
        };
        self.summary.pairs_visited += 2;

        let mut fatal = None;

        if let Some(result) = fare {
            match result {
                Ok(fare) => {
                    debug!(a = %unit.a, b = %unit.b, fare = %fare, "Fetched fare");
                    matrix.set_fare(&unit.a, &unit.b, fare);
                    self.updated(matrix).await?;
                }
                Err(e) => self.failed(&mut fatal, "fare", &unit.a, &unit.b, e),
            }
        }

        for (result, orig, dest) in [
            (forward, &unit.a, &unit.b),
            (reverse, &unit.b, &unit.a),
        ] {
            match result {
                Some(Ok(metrics)) => {
                    debug!(
                        orig = %orig,
                        dest = %dest,
                        seconds = metrics.seconds,
                        miles = metrics.miles,
                        "Fetched driving route"
                    );
                    matrix.set_car_metrics(orig, dest, metrics);
                    self.updated(matrix).await?;
                }
                Some(Err(e)) => self.failed(&mut fatal, "route", orig, dest, e),
                None => {}
            }
        }

        Ok(fatal)
    }

    fn failed(
        &mut self,
        fatal: &mut Option<ProviderError>,
        what: &str,
        orig: &StationCode,
        dest: &StationCode,
        error: ProviderError,
    ) {
        if error.is_transient() {
            warn!(
                call = what,
                orig = %orig,
                dest = %dest,
                error = %error,
                "Giving up after retries, leaving field empty"
            );
            self.summary.failures += 1;
        } else if fatal.is_none() {
            *fatal = Some(error);
        }
    }

    /// Count an update, saving a checkpoint once the threshold is exceeded.
    async fn updated(&mut self, matrix: &Matrix) -> Result<(), PersistenceError> {
        self.summary.updates += 1;
        self.since_checkpoint += 1;

        if self.since_checkpoint > self.threshold {
            self.save(matrix).await?;
            self.summary.checkpoints += 1;
            self.since_checkpoint = 0;
            debug!(
                checkpoints = self.summary.checkpoints,
                visited = self.summary.pairs_visited,
                "Saved checkpoint"
            );
        }
        Ok(())
    }

    async fn save(&self, matrix: &Matrix) -> Result<(), PersistenceError> {
        self.store
            .save_async(&Snapshot::new(self.registry, matrix))
            .await
    }
}
