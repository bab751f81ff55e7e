//! Initialization facade over the ingestion pipeline.
//!
//! Runs sanitize → parse → segment → index exactly once, synchronously,
//! before any query is served. The resulting provider is immutable and may
//! be queried concurrently without locking.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::error::{DataPreparationError, NotFoundError};
use crate::index::TripIndex;
use crate::records::read_position_reports;
use crate::sanitize::{DEFAULT_MAX_ROWS, Sanitizer};
use crate::segment::{Trip, segment_into_trips};

pub struct TripDataProvider {
    trips: Vec<Arc<Trip>>,
    index: TripIndex,
}

impl TripDataProvider {
    /// # Errors
    ///
    /// Any sanitize or parse failure is fatal; no provider is constructed.
    pub fn initialise(raw_path: impl Into<PathBuf>) -> Result<Self, DataPreparationError> {
        Self::initialise_with(raw_path, DEFAULT_MAX_ROWS)
    }

    /// # Errors
    ///
    /// Same as [`TripDataProvider::initialise`].
    pub fn initialise_with(
        raw_path: impl Into<PathBuf>,
        max_rows: usize,
    ) -> Result<Self, DataPreparationError> {
        let sanitizer = Sanitizer::new(raw_path)?.with_max_rows(max_rows);
        let clean_path = sanitizer.run()?;
        let reports = read_position_reports(&clean_path)?;
        let trips = segment_into_trips(reports);
        let index = TripIndex::build(&trips);

        info!(
            trips = trips.len(),
            routes = index.route_names().len(),
            vehicles = index.vehicle_refs().len(),
            "trip data ready"
        );
        Ok(TripDataProvider { trips, index })
    }

    pub fn trips(&self) -> &[Arc<Trip>] {
        &self.trips
    }

    pub fn route_names(&self) -> Vec<String> {
        self.index.route_names()
    }

    pub fn vehicle_refs(&self) -> Vec<String> {
        self.index.vehicle_refs()
    }

    /// # Errors
    ///
    /// [`NotFoundError`] for a route name that was never indexed.
    pub fn trips_for_route(&self, name: &str) -> Result<&[Arc<Trip>], NotFoundError> {
        self.index.trips_for_route(name)
    }

    /// # Errors
    ///
    /// [`NotFoundError`] for a vehicle id that was never indexed.
    pub fn trips_for_vehicle(&self, id: &str) -> Result<&[Arc<Trip>], NotFoundError> {
        self.index.trips_for_vehicle(id)
    }
}
