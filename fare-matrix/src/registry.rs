//! The station registry.
//!
//! Stations come from three layers, later layers winning: the previously
//! saved snapshot, the live BART directory, and the manual override file.
//! The directory is only consulted when the snapshot does not already hold
//! a complete copy of a reference station.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::document::{DocumentError, deep_merge, section};
use crate::domain::{Station, StationCode};
use crate::error::Error;
use crate::providers::StationDirectory;

/// Keys a reference station must carry for the directory fetch to be skipped.
const POPULATED_KEYS: [&str; 3] = ["name", "lat", "long"];

/// The stations taking part in a run, keyed by code.
///
/// Built once at startup and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Registry {
    stations: BTreeMap<StationCode, Station>,
}

impl Registry {
    /// Build the registry from the snapshot, the directory and the manual
    /// overrides.
    ///
    /// The directory is fetched at most once, and only when `reference` is
    /// not fully populated in the snapshot (with overrides applied).
    /// Directory failures are returned as-is; they are not retried here.
    pub async fn build<D: StationDirectory>(
        manual: &Value,
        snapshot: &Value,
        directory: &D,
        reference: &StationCode,
    ) -> Result<Self, Error> {
        let mut stations = Value::Object(
            section(snapshot, "stations")?
                .cloned()
                .unwrap_or_default(),
        );
        let overrides = Value::Object(section(manual, "stations")?.cloned().unwrap_or_default());

        let mut known = stations.clone();
        deep_merge(&mut known, overrides.clone());

        if is_populated(&known, reference) {
            debug!(
                reference = %reference,
                "Reference station present, skipping directory fetch"
            );
        } else {
            info!("Fetching station directory");
            let fetched = directory.fetch_stations().await?;
            info!(count = fetched.len(), "Fetched station directory");

            let mut listed = Map::new();
            for station in fetched {
                let key = station.abbr.to_string();
                let value = serde_json::to_value(&station).map_err(|source| {
                    DocumentError::InvalidStation {
                        code: key.clone(),
                        source,
                    }
                })?;
                listed.insert(key, value);
            }
            deep_merge(&mut stations, Value::Object(listed));
        }

        deep_merge(&mut stations, overrides);

        match stations {
            Value::Object(map) => Ok(Self::from_entries(map)?),
            _ => Ok(Self::default()),
        }
    }

    /// Read the `stations` section of a document without fetching anything.
    pub fn from_document(document: &Value) -> Result<Self, DocumentError> {
        match section(document, "stations")? {
            Some(map) => Self::from_entries(map.clone()),
            None => Ok(Self::default()),
        }
    }

    /// Build a registry directly from stations.
    pub fn from_stations(stations: impl IntoIterator<Item = Station>) -> Self {
        Self {
            stations: stations
                .into_iter()
                .map(|station| (station.abbr.clone(), station))
                .collect(),
        }
    }

    /// Parse every entry of a `stations` object.
    ///
    /// An entry without an `abbr` takes its key as the abbreviation, so
    /// manual stations need not repeat it.
    fn from_entries(entries: Map<String, Value>) -> Result<Self, DocumentError> {
        let mut stations = BTreeMap::new();

        for (key, mut value) in entries {
            let code = StationCode::parse(&key)?;

            if let Value::Object(fields) = &mut value {
                fields
                    .entry("abbr")
                    .or_insert_with(|| Value::String(key.clone()));
            }

            let station: Station = serde_json::from_value(value)
                .map_err(|source| DocumentError::InvalidStation { code: key, source })?;
            stations.insert(code, station);
        }

        Ok(Self { stations })
    }

    /// Look up a station.
    pub fn get(&self, code: &StationCode) -> Option<&Station> {
        self.stations.get(code)
    }

    /// All station codes in ascending order.
    pub fn codes(&self) -> impl Iterator<Item = &StationCode> {
        self.stations.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StationCode, &Station)> {
        self.stations.iter()
    }

    /// Number of stations.
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Number of ordered pairs of distinct stations, n·(n−1).
    pub fn pair_count(&self) -> usize {
        let n = self.len();
        n * n.saturating_sub(1)
    }

    /// Every ordered pair of distinct stations, in code order.
    pub fn ordered_pairs(&self) -> impl Iterator<Item = (&StationCode, &StationCode)> {
        self.codes().flat_map(move |orig| {
            self.codes()
                .filter(move |dest| *dest != orig)
                .map(move |dest| (orig, dest))
        })
    }
}

/// Whether `stations` holds `reference` with all of [`POPULATED_KEYS`].
fn is_populated(stations: &Value, reference: &StationCode) -> bool {
    stations
        .get(reference.as_str())
        .and_then(Value::as_object)
        .is_some_and(|station| {
            POPULATED_KEYS
                .iter()
                .all(|key| station.get(*key).is_some_and(|v| !v.is_null()))
        })
}
