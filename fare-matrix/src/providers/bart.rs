//! BART API client: station directory and fares.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::domain::{Fare, Station, StationCode};

use super::error::ProviderError;
use super::http::{build_client, decode, fetch_body};
use super::rate_limit::RateLimiter;
use super::{FareProvider, StationDirectory};

/// Default base URL for the BART API.
const DEFAULT_BASE_URL: &str = "http://api.bart.gov/api";

/// Default spacing between calls.
const DEFAULT_CALL_DELAY: Duration = Duration::from_millis(250);

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 2;

const PROVIDER: &str = "bart";

/// Configuration for the BART client.
#[derive(Debug, Clone)]
pub struct BartConfig {
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

impl BartConfig {
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

/// Envelope shared by every BART JSON response.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    root: T,
}

#[derive(Debug, Deserialize)]
struct StationsRoot {
    stations: StationList,
}

#[derive(Debug, Deserialize)]
struct StationList {
    station: Vec<StationDto>,
}

/// A station as listed by `stn.aspx?cmd=stns`.
#[derive(Debug, Clone, Deserialize)]
struct StationDto {
    abbr: String,
    name: String,
    gtfs_latitude: String,
    gtfs_longitude: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    county: String,
    #[serde(default)]
    zipcode: String,
}

#[derive(Debug, Deserialize)]
struct FareRoot {
    trip: Option<Trip>,
    message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Trip {
    fare: String,
}

/// Client for the BART station and schedule APIs.
///
/// The station directory and fares are separate services, so each gets its
/// own rate limiter. The semaphore is shared.
#[derive(Debug, Clone)]
pub struct BartClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    directory_limiter: Arc<RateLimiter>,
    fare_limiter: Arc<RateLimiter>,
    semaphore: Arc<Semaphore>,
}

impl BartClient {
    /// Create a new BART client.
    pub fn new(config: BartConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            http: build_client(config.timeout_secs)?,
            base_url: config.base_url,
            api_key: config.api_key,
            directory_limiter: Arc::new(RateLimiter::new(config.call_delay)),
            fare_limiter: Arc::new(RateLimiter::new(config.call_delay)),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }

    /// Issue a rate-limited GET against one of the BART endpoints.
    async fn get(
        &self,
        limiter: &RateLimiter,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<String, ProviderError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ProviderError::Api {
                status: 0,
                message: "Semaphore closed".to_string(),
            })?;

        limiter.acquire().await;

        let url = format!("{}/{}", self.base_url, endpoint);
        let request = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("json", "y")])
            .query(query);

        fetch_body(request, PROVIDER).await
    }
}

impl StationDirectory for BartClient {
    async fn fetch_stations(&self) -> Result<Vec<Station>, ProviderError> {
        let body = self
            .get(&self.directory_limiter, "stn.aspx", &[("cmd", "stns")])
            .await?;
        let envelope: Envelope<StationsRoot> = decode(&body)?;
        let stations = convert_stations(envelope.root.stations.station)?;
        debug!(count = stations.len(), "Fetched BART station directory");
        Ok(stations)
    }
}

impl FareProvider for BartClient {
    async fn fare(&self, orig: &StationCode, dest: &StationCode) -> Result<Fare, ProviderError> {
        let body = self
            .get(
                &self.fare_limiter,
                "sched.aspx",
                &[("cmd", "fare"), ("orig", orig.as_str()), ("dest", dest.as_str())],
            )
            .await?;
        parse_fare(&body)
    }
}

/// Convert directory entries into stations.
///
/// Entries whose abbreviation is not a valid station code are skipped.
fn convert_stations(dtos: Vec<StationDto>) -> Result<Vec<Station>, ProviderError> {
    let mut stations = Vec::with_capacity(dtos.len());

    for dto in dtos {
        let abbr = match StationCode::parse(&dto.abbr) {
            Ok(code) => code,
            Err(e) => {
                warn!(abbr = %dto.abbr, error = %e, "Skipping directory entry");
                continue;
            }
        };

        let lat = parse_coordinate(&abbr, &dto.gtfs_latitude)?;
        let long = parse_coordinate(&abbr, &dto.gtfs_longitude)?;

        stations.push(Station {
            abbr,
            address: dto.address,
            city: dto.city,
            county: dto.county,
            lat,
            long,
            name: dto.name,
            zipcode: dto.zipcode,
            extra: Default::default(),
        });
    }

    Ok(stations)
}

fn parse_coordinate(abbr: &StationCode, raw: &str) -> Result<f64, ProviderError> {
    raw.trim()
        .parse()
        .map_err(|_| ProviderError::malformed(format!("station {abbr}: invalid coordinate {raw:?}")))
}

/// Extract the fare from a `sched.aspx?cmd=fare` body.
fn parse_fare(body: &str) -> Result<Fare, ProviderError> {
    let envelope: Envelope<FareRoot> = decode(body)?;

    match envelope.root.trip {
        Some(trip) => Ok(Fare::parse(&trip.fare)?),
        None => {
            let detail = envelope
                .root
                .message
                .map(|m| m.to_string())
                .unwrap_or_else(|| "no message".to_string());
            Err(ProviderError::malformed(format!(
                "fare response has no trip ({detail})"
            )))
        }
    }
}
