//! Lookup structures from route name and vehicle id to owned trips.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::NotFoundError;
use crate::segment::Trip;

/// Built once from the finished trip list, read-only afterward. Holds the
/// trips directly rather than offsets into a parallel list.
pub struct TripIndex {
    by_route: HashMap<String, Vec<Arc<Trip>>>,
    by_vehicle: HashMap<String, Vec<Arc<Trip>>>,
}

impl TripIndex {
    pub fn build(trips: &[Arc<Trip>]) -> Self {
        let mut by_route: HashMap<String, Vec<Arc<Trip>>> = HashMap::new();
        let mut by_vehicle: HashMap<String, Vec<Arc<Trip>>> = HashMap::new();

        for trip in trips {
            by_route
                .entry(trip.published_line_name.clone())
                .or_default()
                .push(Arc::clone(trip));
            by_vehicle
                .entry(trip.vehicle_ref.clone())
                .or_default()
                .push(Arc::clone(trip));
        }

        TripIndex {
            by_route,
            by_vehicle,
        }
    }

    /// All distinct route names with at least one trip, sorted.
    pub fn route_names(&self) -> Vec<String> {
        sorted_keys(&self.by_route)
    }

    /// All distinct vehicle ids with at least one trip, sorted.
    pub fn vehicle_refs(&self) -> Vec<String> {
        sorted_keys(&self.by_vehicle)
    }

    /// Trips for a route name, in construction order.
    ///
    /// # Errors
    ///
    /// An unindexed name is a [`NotFoundError`], not an empty list.
    pub fn trips_for_route(&self, name: &str) -> Result<&[Arc<Trip>], NotFoundError> {
        lookup(&self.by_route, name)
    }

    /// Trips for a vehicle id, in construction order.
    ///
    /// # Errors
    ///
    /// An unindexed id is a [`NotFoundError`], not an empty list.
    pub fn trips_for_vehicle(&self, id: &str) -> Result<&[Arc<Trip>], NotFoundError> {
        lookup(&self.by_vehicle, id)
    }
}

fn sorted_keys(map: &HashMap<String, Vec<Arc<Trip>>>) -> Vec<String> {
    map.keys()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn lookup<'a>(
    map: &'a HashMap<String, Vec<Arc<Trip>>>,
    key: &str,
) -> Result<&'a [Arc<Trip>], NotFoundError> {
    map.get(key)
        .map(Vec::as_slice)
        .ok_or_else(|| NotFoundError {
            key: key.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::PositionReport;
    use crate::segment::segment_into_trips;
    use chrono::NaiveDateTime;

    fn report(vehicle: &str, line: &str, expected: &str) -> PositionReport {
        PositionReport {
            direction_ref: 0,
            published_line_name: line.to_string(),
            vehicle_ref: vehicle.to_string(),
            origin_name: "Origin".to_string(),
            destination_name: "Dest".to_string(),
            latitude: 40.7,
            longitude: -73.9,
            arrival_proximity_text: "at stop".to_string(),
            distance_from_stop: Some(100),
            expected_arrival_time: Some(
                NaiveDateTime::parse_from_str(expected, "%Y-%m-%d %H:%M:%S").unwrap(),
            ),
        }
    }

    fn sample_index() -> (Vec<Arc<Trip>>, TripIndex) {
        let trips = segment_into_trips(vec![
            report("V2", "LineB", "2017-06-01 10:00:00"),
            report("V1", "LineA", "2017-06-01 10:01:00"),
            // Second trip for V1 on the same line, far outside the window.
            report("V1", "LineA", "2017-06-01 12:00:00"),
        ]);
        let index = TripIndex::build(&trips);
        (trips, index)
    }

    #[test]
    fn test_route_names_are_sorted() {
        let (_, index) = sample_index();
        assert_eq!(index.route_names(), ["LineA", "LineB"]);
    }

    #[test]
    fn test_vehicle_refs_are_sorted() {
        let (_, index) = sample_index();
        assert_eq!(index.vehicle_refs(), ["V1", "V2"]);
    }

    #[test]
    fn test_trips_for_route_in_construction_order() {
        let (_, index) = sample_index();
        let trips = index.trips_for_route("LineA").unwrap();

        assert_eq!(trips.len(), 2);
        assert!(trips[0].start_time < trips[1].start_time);
    }

    #[test]
    fn test_trips_for_vehicle() {
        let (_, index) = sample_index();
        assert_eq!(index.trips_for_vehicle("V2").unwrap().len(), 1);
        assert_eq!(index.trips_for_vehicle("V1").unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_route_is_not_found() {
        let (_, index) = sample_index();
        let err = index.trips_for_route("NoSuchLine").unwrap_err();
        assert_eq!(err.key, "NoSuchLine");
    }

    #[test]
    fn test_unknown_vehicle_is_not_found() {
        let (_, index) = sample_index();
        assert!(index.trips_for_vehicle("ghost").is_err());
    }
}
