//! GraphHopper routing API client.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Semaphore;

use crate::domain::{CarMetrics, Coordinates};

use super::RouteProvider;
use super::error::ProviderError;
use super::http::{build_client, decode, fetch_body};
use super::rate_limit::RateLimiter;

/// Default base URL for the GraphHopper API.
const DEFAULT_BASE_URL: &str = "https://graphhopper.com/api/1";

/// Routing profile (vehicle) for every request.
const PROFILE: &str = "car";

/// Default spacing between calls.
const DEFAULT_CALL_DELAY: Duration = Duration::from_millis(250);

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 2;

const PROVIDER: &str = "graphhopper";

/// Configuration for the GraphHopper client.
#[derive(Debug, Clone)]
pub struct GraphHopperConfig {
    /// API key, sent as the `key` query parameter
    pub api_key: String,
    /// Base URL for the API
    pub base_url: String,
    /// Minimum spacing between calls
    pub call_delay: Duration,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl GraphHopperConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            call_delay: DEFAULT_CALL_DELAY,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 30,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the spacing between calls.
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Response from `/route`.
#[derive(Debug, Deserialize)]
struct RouteResponse {
    paths: Vec<RoutePath>,
}

/// One candidate path. Paths are ordered best first.
#[derive(Debug, Deserialize)]
struct RoutePath {
    /// Distance in meters.
    distance: f64,
    /// Time in milliseconds.
    time: f64,
}

/// Client for the GraphHopper routing API.
#[derive(Debug, Clone)]
pub struct GraphHopperClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    limiter: Arc<RateLimiter>,
    semaphore: Arc<Semaphore>,
}

impl GraphHopperClient {
    /// Create a new GraphHopper client.
    pub fn new(config: GraphHopperConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            http: build_client(config.timeout_secs)?,
            base_url: config.base_url,
            api_key: config.api_key,
            limiter: Arc::new(RateLimiter::new(config.call_delay)),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }
}

impl RouteProvider for GraphHopperClient {
    async fn drive(&self, from: Coordinates, to: Coordinates) -> Result<CarMetrics, ProviderError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ProviderError::Api {
                status: 0,
                message: "Semaphore closed".to_string(),
            })?;

        self.limiter.acquire().await;

        let url = format!("{}/route", self.base_url);
        let (from, to) = (from.to_string(), to.to_string());
        let request = self.http.get(&url).query(&[
            ("key", self.api_key.as_str()),
            ("profile", PROFILE),
            ("instructions", "false"),
            ("calc_points", "false"),
            ("point", from.as_str()),
            ("point", to.as_str()),
        ]);

        let body = fetch_body(request, PROVIDER).await?;
        parse_route(&body)
    }
}

/// Extract metrics for the best path from a `/route` body.
fn parse_route(body: &str) -> Result<CarMetrics, ProviderError> {
    let response: RouteResponse = decode(body)?;
    let best = response
        .paths
        .first()
        .ok_or_else(|| ProviderError::malformed("route response has no paths"))?;
    Ok(CarMetrics::from_route(best.time, best.distance))
}
