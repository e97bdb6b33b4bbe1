//! External data providers.
//!
//! Three kinds of lookup feed the matrix: the station directory and fares
//! (both served by the BART API) and driving routes (GraphHopper). The
//! builder only sees the traits below, so it can be exercised with mock
//! providers in tests.
//!
//! Each service (directory, fares, routing) has its own [`RateLimiter`],
//! and each HTTP client a semaphore bounding requests in flight. Providers are shared with
//! the retry layer across attempts, so they and their futures are `Send`.

mod bart;
mod error;
mod graphhopper;
mod http;
mod rate_limit;
mod retry;

use std::future::Future;

use crate::domain::{CarMetrics, Coordinates, Fare, Station, StationCode};

pub use bart::{BartClient, BartConfig};
pub use error::ProviderError;
pub use graphhopper::{GraphHopperClient, GraphHopperConfig};
pub use rate_limit::RateLimiter;
pub use retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES, RetryPolicy};

/// Source of the full station list.
pub trait StationDirectory: Send + Sync {
    /// Fetch every station in the network.
    fn fetch_stations(&self) -> impl Future<Output = Result<Vec<Station>, ProviderError>> + Send;
}

/// Source of transit fares.
pub trait FareProvider: Send + Sync {
    /// Fetch the fare between two stations.
    fn fare(
        &self,
        orig: &StationCode,
        dest: &StationCode,
    ) -> impl Future<Output = Result<Fare, ProviderError>> + Send;
}

/// Source of driving routes.
pub trait RouteProvider: Send + Sync {
    /// Fetch driving time and distance for the best route from `from` to `to`.
    fn drive(
        &self,
        from: Coordinates,
        to: Coordinates,
    ) -> impl Future<Output = Result<CarMetrics, ProviderError>> + Send;
}
