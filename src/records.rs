//! Typed position-report records parsed from the cleaned CSV.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::DataPreparationError;

/// One vehicle-position report, mapped by column name so a reordered feed
/// still parses. Only 10 of the 17 feed columns are bound; the rest are
/// ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionReport {
    #[serde(rename = "DirectionRef")]
    pub direction_ref: i32,

    #[serde(rename = "PublishedLineName")]
    pub published_line_name: String,

    #[serde(rename = "VehicleRef")]
    pub vehicle_ref: String,

    #[serde(rename = "OriginName")]
    pub origin_name: String,

    #[serde(rename = "DestinationName")]
    pub destination_name: String,

    #[serde(rename = "VehicleLocation.Latitude")]
    pub latitude: f64,

    #[serde(rename = "VehicleLocation.Longitude")]
    pub longitude: f64,

    #[serde(rename = "ArrivalProximityText")]
    pub arrival_proximity_text: String,

    #[serde(rename = "DistanceFromStop")]
    pub distance_from_stop: Option<i64>,

    #[serde(rename = "ExpectedArrivalTime", with = "feed_datetime")]
    pub expected_arrival_time: Option<NaiveDateTime>,
}

/// Timestamps in the feed use `yyyy-MM-dd HH:mm:ss`; a blanked field is a
/// missing value.
pub(crate) mod feed_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        if value.is_empty() {
            return Ok(None);
        }
        NaiveDateTime::parse_from_str(&value, FORMAT)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

/// Reads every data row of the cleaned CSV into a materialized sequence.
///
/// Rows that fail type coercion are skipped with a logged reason; downstream
/// grouping needs full-set access, so nothing is streamed.
///
/// # Errors
///
/// Fails only if the cleaned file itself cannot be opened or read.
pub fn read_position_reports(path: &Path) -> Result<Vec<PositionReport>, DataPreparationError> {
    let file = File::open(path).map_err(|e| DataPreparationError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = csv::Reader::from_reader(file);

    let mut reports = Vec::new();
    let mut skipped = 0usize;
    for (i, result) in reader.deserialize().enumerate() {
        match result {
            Ok(report) => reports.push(report),
            Err(reason) => {
                warn!(row = i + 1, %reason, "skipping unparsable row");
                skipped += 1;
            }
        }
    }

    info!(parsed = reports.len(), skipped, "parsed position reports");
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    const HEADER: &str = "RecordedAtTime,DirectionRef,PublishedLineName,OriginName,OriginLat,\
OriginLong,DestinationName,DestinationLat,DestinationLong,VehicleRef,\
VehicleLocation.Latitude,VehicleLocation.Longitude,NextStopPointName,\
ArrivalProximityText,DistanceFromStop,ExpectedArrivalTime,ScheduledArrivalTime";

    fn parse(name: &str, content: &str) -> Vec<PositionReport> {
        let path = env::temp_dir().join(name);
        fs::write(&path, content).unwrap();
        read_position_reports(&path).unwrap()
    }

    #[test]
    fn test_reads_typed_fields() {
        let content = format!(
            "{HEADER}\n2017-06-01 09:58:00,1,Line5,Origin,40.7,-73.9,Dest,40.8,-73.8,V42,\
40.7661,-73.9876,Stop,approaching,250,2017-06-01 10:00:00,10:05:00\n"
        );
        let reports = parse("bus_trip_geo_records_typed.csv", &content);

        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.direction_ref, 1);
        assert_eq!(report.published_line_name, "Line5");
        assert_eq!(report.vehicle_ref, "V42");
        assert_eq!(report.latitude, 40.7661);
        assert_eq!(report.longitude, -73.9876);
        assert_eq!(report.distance_from_stop, Some(250));
        assert_eq!(
            report.expected_arrival_time,
            Some(
                NaiveDateTime::parse_from_str("2017-06-01 10:00:00", feed_datetime::FORMAT)
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_blanked_fields_parse_as_missing() {
        let content = format!(
            "{HEADER}\n2017-06-01 09:58:00,0,Line1,Origin,40.7,-73.9,Dest,40.8,-73.8,V1,\
40.7,-73.9,Stop,at stop,,,10:05:00\n"
        );
        let reports = parse("bus_trip_geo_records_blank.csv", &content);

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].distance_from_stop, None);
        assert_eq!(reports[0].expected_arrival_time, None);
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let content = "VehicleRef,PublishedLineName,DirectionRef,OriginName,DestinationName,\
VehicleLocation.Longitude,VehicleLocation.Latitude,ArrivalProximityText,DistanceFromStop,\
ExpectedArrivalTime\nV9,Line2,0,Origin,Dest,-73.9,40.7,at stop,50,2017-06-01 10:00:00\n";
        let reports = parse("bus_trip_geo_records_reorder.csv", content);

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].vehicle_ref, "V9");
        assert_eq!(reports[0].latitude, 40.7);
        assert_eq!(reports[0].longitude, -73.9);
    }

    #[test]
    fn test_malformed_row_is_skipped_not_fatal() {
        let content = format!(
            "{HEADER}\n2017-06-01 09:58:00,not-an-int,Line1,Origin,40.7,-73.9,Dest,40.8,-73.8,V1,\
40.7,-73.9,Stop,at stop,100,2017-06-01 10:00:00,10:05:00\n\
2017-06-01 09:58:00,0,Line1,Origin,40.7,-73.9,Dest,40.8,-73.8,V1,\
40.7,-73.9,Stop,at stop,100,garbage-timestamp,10:05:00\n\
2017-06-01 09:58:00,0,Line1,Origin,40.7,-73.9,Dest,40.8,-73.8,V1,\
40.7,-73.9,Stop,at stop,100,2017-06-01 10:00:00,10:05:00\n"
        );
        let reports = parse("bus_trip_geo_records_skip.csv", &content);

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].direction_ref, 0);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let path = env::temp_dir().join("bus_trip_geo_records_missing.csv");
        let _ = fs::remove_file(&path);
        assert!(matches!(
            read_position_reports(&path),
            Err(DataPreparationError::Io { .. })
        ));
    }
}
