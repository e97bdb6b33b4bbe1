//! Domain types for the travel-cost matrix.
//!
//! All types enforce their invariants at construction time, so code that
//! receives them can trust their validity.

mod edge;
mod fare;
mod station;

pub use edge::{CarMetrics, RouteEdge};
pub use fare::{Fare, InvalidFare};
pub use station::{Coordinates, InvalidStationCode, Station, StationCode};
