//! Groups time-ordered position reports into discrete trips.
//!
//! Reports are pre-grouped by a composite key (line, vehicle, direction,
//! origin, destination) and then split wherever consecutive expected-arrival
//! times drift apart by more than the trip window.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::records::PositionReport;

/// Maximum whole-minute gap between consecutive reports of one trip.
pub const TRIP_WINDOW_MINUTES: i64 = 25;

/// One member report of a trip, fully populated: the validity gate has
/// already removed anything with missing fields.
#[derive(Debug, Clone, PartialEq)]
pub struct TripPoint {
    pub longitude: f64,
    pub latitude: f64,
    pub arrival_proximity: String,
    pub distance_from_stop: i64,
    pub expected_arrival: NaiveDateTime,
}

/// A continuous segment of reports for one line/vehicle/direction/origin/
/// destination combination. Constructed once and shared read-only.
#[derive(Debug, PartialEq)]
pub struct Trip {
    pub published_line_name: String,
    pub vehicle_ref: String,
    pub direction_ref: i32,
    pub origin_name: String,
    pub destination_name: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub points: Vec<TripPoint>,
}

impl Trip {
    /// Builds a trip from its member reports. Callers guarantee at least one
    /// member; coordinate-sequence length always equals member count.
    fn from_reports(reports: Vec<ValidReport>) -> Self {
        debug_assert!(!reports.is_empty());
        let first = &reports[0];
        let last = &reports[reports.len() - 1];

        let mut trip = Trip {
            published_line_name: first.published_line_name.clone(),
            vehicle_ref: first.vehicle_ref.clone(),
            direction_ref: first.direction_ref,
            origin_name: first.origin_name.clone(),
            destination_name: first.destination_name.clone(),
            start_time: first.expected_arrival,
            end_time: last.expected_arrival,
            points: Vec::with_capacity(reports.len()),
        };
        for report in reports {
            trip.points.push(TripPoint {
                longitude: report.longitude,
                latitude: report.latitude,
                arrival_proximity: report.arrival_proximity,
                distance_from_stop: report.distance_from_stop,
                expected_arrival: report.expected_arrival,
            });
        }
        trip
    }
}

/// A report that passed the trip-construction validity gate, so every field
/// a trip needs is present.
struct ValidReport {
    direction_ref: i32,
    published_line_name: String,
    vehicle_ref: String,
    origin_name: String,
    destination_name: String,
    latitude: f64,
    longitude: f64,
    arrival_proximity: String,
    distance_from_stop: i64,
    expected_arrival: NaiveDateTime,
}

impl ValidReport {
    /// The gate: expected arrival present, proximity text not the `NA`
    /// sentinel, distance present. Distinct from the range checks in the
    /// sanitizer.
    fn from_report(report: PositionReport) -> Option<Self> {
        let expected_arrival = report.expected_arrival_time?;
        if report.arrival_proximity_text == "NA" {
            return None;
        }
        let distance_from_stop = report.distance_from_stop?;

        Some(ValidReport {
            direction_ref: report.direction_ref,
            published_line_name: report.published_line_name,
            vehicle_ref: report.vehicle_ref,
            origin_name: report.origin_name,
            destination_name: report.destination_name,
            latitude: report.latitude,
            longitude: report.longitude,
            arrival_proximity: report.arrival_proximity_text,
            distance_from_stop,
            expected_arrival,
        })
    }

    /// Grouping handle only; records of one trip share it, not vice versa.
    fn composite_key(&self) -> String {
        let direction = self.direction_ref.to_string();
        [
            self.published_line_name.as_str(),
            self.vehicle_ref.as_str(),
            direction.as_str(),
            self.origin_name.as_str(),
            self.destination_name.as_str(),
        ]
        .join("|")
    }
}

/// Grouping that iterates in first-seen key order, keeping trip construction
/// reproducible across runs.
struct OrderedGroups {
    index: HashMap<String, usize>,
    groups: Vec<(String, Vec<ValidReport>)>,
}

impl OrderedGroups {
    fn new() -> Self {
        OrderedGroups {
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }

    fn push(&mut self, key: String, report: ValidReport) {
        match self.index.get(&key) {
            Some(&i) => self.groups[i].1.push(report),
            None => {
                self.index.insert(key.clone(), self.groups.len());
                self.groups.push((key, vec![report]));
            }
        }
    }

    fn into_groups(self) -> impl Iterator<Item = (String, Vec<ValidReport>)> {
        self.groups.into_iter()
    }
}

/// Turns the full report set into the finite trip list.
///
/// Runs exactly once during initialization; the result is immutable
/// afterwards and shared via [`Arc`].
pub fn segment_into_trips(reports: Vec<PositionReport>) -> Vec<Arc<Trip>> {
    let total = reports.len();
    let mut valid: Vec<ValidReport> = reports
        .into_iter()
        .filter_map(ValidReport::from_report)
        .collect();
    debug!(total, valid = valid.len(), "applied validity gate");

    // Stable, so reports with equal timestamps keep their feed order.
    valid.sort_by_key(|r| r.expected_arrival);

    let mut groups = OrderedGroups::new();
    for report in valid {
        groups.push(report.composite_key(), report);
    }

    let mut trips = Vec::new();
    for (key, reports) in groups.into_groups() {
        let before = trips.len();
        let mut current: Vec<ValidReport> = Vec::new();
        for report in reports {
            if let Some(prev) = current.last() {
                if starts_new_trip(prev, &report) {
                    trips.push(Arc::new(Trip::from_reports(std::mem::take(&mut current))));
                }
            }
            current.push(report);
        }
        if !current.is_empty() {
            trips.push(Arc::new(Trip::from_reports(current)));
        }
        debug!(key = %key, trips = trips.len() - before, "segmented group");
    }

    info!(trips = trips.len(), "trip construction complete");
    trips
}

/// Whole-minute difference, so 25m59s still extends the current trip.
fn starts_new_trip(prev: &ValidReport, current: &ValidReport) -> bool {
    (current.expected_arrival - prev.expected_arrival).num_minutes() > TRIP_WINDOW_MINUTES
}
