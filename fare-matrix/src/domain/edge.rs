//! Travel-cost records between two stations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Fare;

/// Routing APIs report durations in milliseconds.
const SECONDS_PER_MILLISECOND: f64 = 0.001;

/// Routing APIs report distances in meters.
const MILES_PER_METER: f64 = 0.000621371;

/// Driving time and distance for one direction of travel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarMetrics {
    /// Driving time in seconds.
    pub seconds: f64,
    /// Driving distance in miles.
    pub miles: f64,
}

impl CarMetrics {
    /// Convert a routing response in milliseconds and meters.
    pub fn from_route(time_ms: f64, distance_m: f64) -> Self {
        Self {
            seconds: time_ms * SECONDS_PER_MILLISECOND,
            miles: distance_m * MILES_PER_METER,
        }
    }
}

/// Travel costs from one station to another.
///
/// Absent fields have not been fetched yet and serialize as `null`. Fields
/// are declared in key order so the serialized form matches the persisted
/// document; keys added by manual overrides are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteEdge {
    /// Driving distance in miles.
    #[serde(default)]
    pub car_distance: Option<f64>,

    /// Driving time in seconds.
    #[serde(default)]
    pub car_time: Option<f64>,

    /// Transit fare. The same in both directions.
    #[serde(default)]
    pub fare: Option<Fare>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RouteEdge {
    pub fn needs_car_metrics(&self) -> bool {
        self.car_time.is_none() || self.car_distance.is_none()
    }

    pub fn needs_fare(&self) -> bool {
        self.fare.is_none()
    }

    /// True once every field has been fetched.
    pub fn is_resolved(&self) -> bool {
        !self.needs_car_metrics() && !self.needs_fare()
    }
}
