//! The in-memory route matrix.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::document::{DocumentError, section};
use crate::domain::{CarMetrics, Fare, RouteEdge, StationCode};
use crate::registry::Registry;

type Row = BTreeMap<StationCode, RouteEdge>;

/// Travel costs for every ordered pair of stations, keyed origin → destination.
///
/// The map is private: fares can only be written through [`Matrix::set_fare`],
/// which always writes both directions, so fare symmetry holds by
/// construction for everything the builder fetches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Matrix {
    routes: BTreeMap<StationCode, Row>,
}

impl Matrix {
    /// Create an empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the `routes` section of a document.
    ///
    /// A missing section yields an empty matrix.
    pub fn from_document(document: &Value) -> Result<Self, DocumentError> {
        match section(document, "routes")? {
            Some(routes) => serde_json::from_value(Value::Object(routes.clone()))
                .map_err(DocumentError::InvalidRoutes),
            None => Ok(Self::new()),
        }
    }

    /// The edge from `orig` to `dest`, if a record exists.
    pub fn get(&self, orig: &StationCode, dest: &StationCode) -> Option<&RouteEdge> {
        self.routes.get(orig).and_then(|row| row.get(dest))
    }

    fn edge_mut(&mut self, orig: &StationCode, dest: &StationCode) -> &mut RouteEdge {
        self.routes
            .entry(orig.clone())
            .or_default()
            .entry(dest.clone())
            .or_default()
    }

    /// Record the fare between `a` and `b`, in both directions.
    pub fn set_fare(&mut self, a: &StationCode, b: &StationCode, fare: Fare) {
        self.edge_mut(a, b).fare = Some(fare);
        self.edge_mut(b, a).fare = Some(fare);
    }

    /// Record driving metrics for the `orig` → `dest` direction only.
    pub fn set_car_metrics(&mut self, orig: &StationCode, dest: &StationCode, metrics: CarMetrics) {
        let edge = self.edge_mut(orig, dest);
        edge.car_time = Some(metrics.seconds);
        edge.car_distance = Some(metrics.miles);
    }

    /// Insert an empty edge for every ordered pair of distinct registry
    /// stations that has none. Returns the number of records inserted.
    pub fn ensure_complete(&mut self, registry: &Registry) -> usize {
        let mut inserted = 0;
        for (orig, dest) in registry.ordered_pairs() {
            let row = self.routes.entry(orig.clone()).or_default();
            if !row.contains_key(dest) {
                row.insert(dest.clone(), RouteEdge::default());
                inserted += 1;
            }
        }
        inserted
    }

    /// Copy fares that are only known in one direction onto the other.
    ///
    /// Overrides or older snapshots can hold a fare for A→B but not B→A.
    /// Returns the number of edges filled in. Conflicting fares are left
    /// alone and logged.
    pub fn reconcile_fares(&mut self) -> usize {
        let mut missing = Vec::new();

        for (orig, row) in &self.routes {
            for (dest, edge) in row {
                let Some(fare) = edge.fare else { continue };
                match self.get(dest, orig).and_then(|reverse| reverse.fare) {
                    None => missing.push((dest.clone(), orig.clone(), fare)),
                    Some(reverse) if reverse != fare && orig < dest => {
                        warn!(
                            orig = %orig,
                            dest = %dest,
                            forward = fare.cents(),
                            reverse = reverse.cents(),
                            "Fares differ by direction"
                        );
                    }
                    Some(_) => {}
                }
            }
        }

        let filled = missing.len();
        for (orig, dest, fare) in missing {
            self.edge_mut(&orig, &dest).fare = Some(fare);
        }
        filled
    }

    /// Total number of edge records.
    pub fn len(&self) -> usize {
        self.routes.values().map(BTreeMap::len).sum()
    }

    /// Check if the matrix has no edges.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registry pairs whose edge is missing any field.
    pub fn unresolved_count(&self, registry: &Registry) -> usize {
        registry
            .ordered_pairs()
            .filter(|(orig, dest)| !self.get(orig, dest).is_some_and(RouteEdge::is_resolved))
            .count()
    }

    /// Every edge record, in origin then destination order.
    pub fn iter(&self) -> impl Iterator<Item = (&StationCode, &StationCode, &RouteEdge)> {
        self.routes
            .iter()
            .flat_map(|(orig, row)| row.iter().map(move |(dest, edge)| (orig, dest, edge)))
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::Station;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn registry(codes: &BTreeSet<String>) -> Registry {
        Registry::from_stations(codes.iter().map(|c| Station {
            abbr: StationCode::parse(c).unwrap(),
            address: String::new(),
            city: String::new(),
            county: String::new(),
            lat: 0.0,
            long: 0.0,
            name: c.clone(),
            zipcode: String::new(),
            extra: BTreeMap::new(),
        }))
    }

    proptest! {
        /// n stations always yield exactly n·(n−1) edges
        #[test]
        fn complete_matrix_has_n_times_n_minus_one_edges(
            codes in proptest::collection::btree_set("[A-Z]{2,4}", 0..12)
        ) {
            let registry = registry(&codes);
            let mut matrix = Matrix::new();
            matrix.ensure_complete(&registry);

            let n = codes.len();
            prop_assert_eq!(matrix.len(), n * n.saturating_sub(1));
            prop_assert!(matrix.iter().all(|(o, d, _)| o != d));
        }

        /// Any sequence of fare writes leaves the matrix symmetric
        #[test]
        fn set_fare_keeps_symmetry(
            writes in proptest::collection::vec((0usize..5, 0usize..5, 0u32..2000), 0..30)
        ) {
            let names = ["A", "B", "C", "D", "E"];
            let mut matrix = Matrix::new();

            for (a, b, cents) in writes {
                if a == b {
                    continue;
                }
                matrix.set_fare(
                    &StationCode::parse(names[a]).unwrap(),
                    &StationCode::parse(names[b]).unwrap(),
                    Fare::from_cents(cents),
                );
            }

            for (orig, dest, edge) in matrix.iter() {
                let reverse = matrix.get(dest, orig).unwrap();
                prop_assert_eq!(edge.fare, reverse.fare);
            }
        }
    }
}
