//! Converts a trip into a geometry and its flat descriptive property list.

use geojson::Geometry;

use crate::segment::Trip;

/// Timestamps in rendered properties use ISO-8601 without an offset.
pub const PROPERTY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Geometry for one trip, decided once here: a single-report trip renders as
/// a point, anything longer as a line through the points in original order.
#[derive(Debug, Clone, PartialEq)]
pub enum TripGeometry {
    Point([f64; 2]),
    LineString(Vec<[f64; 2]>),
}

impl TripGeometry {
    pub fn of(trip: &Trip) -> Self {
        if trip.points.len() == 1 {
            let point = &trip.points[0];
            TripGeometry::Point([point.longitude, point.latitude])
        } else {
            TripGeometry::LineString(
                trip.points
                    .iter()
                    .map(|p| [p.longitude, p.latitude])
                    .collect(),
            )
        }
    }

    pub fn to_geojson(&self) -> Geometry {
        let value = match self {
            TripGeometry::Point([lon, lat]) => geojson::Value::Point(vec![*lon, *lat]),
            TripGeometry::LineString(coords) => geojson::Value::LineString(
                coords.iter().map(|[lon, lat]| vec![*lon, *lat]).collect(),
            ),
        };
        Geometry::new(value)
    }
}

/// The ordered property list for one trip: 8 trip-level entries followed by
/// 4 entries per point. Consumers rely on this exact order and grouping.
pub fn trip_properties(trip: &Trip) -> Vec<(String, String)> {
    let mut properties = Vec::with_capacity(8 + 4 * trip.points.len());

    properties.push(("VehicleRef".to_string(), trip.vehicle_ref.clone()));
    properties.push((
        "PublishedLineName".to_string(),
        trip.published_line_name.clone(),
    ));
    properties.push(("DirectionRef".to_string(), trip.direction_ref.to_string()));
    properties.push(("OriginName".to_string(), trip.origin_name.clone()));
    properties.push(("DestinationName".to_string(), trip.destination_name.clone()));
    properties.push((
        "StartTime".to_string(),
        trip.start_time.format(PROPERTY_TIME_FORMAT).to_string(),
    ));
    properties.push((
        "EndTime".to_string(),
        trip.end_time.format(PROPERTY_TIME_FORMAT).to_string(),
    ));
    properties.push(("NumOfPoints".to_string(), trip.points.len().to_string()));

    for (i, point) in trip.points.iter().enumerate() {
        let n = i + 1;
        properties.push((
            format!("Point {n} geom"),
            format!("POINT({} {})", point.longitude, point.latitude),
        ));
        properties.push((format!("Point {n} arrival"), point.arrival_proximity.clone()));
        properties.push((
            format!("Point {n} dist from stop"),
            point.distance_from_stop.to_string(),
        ));
        properties.push((
            format!("Point {n} time"),
            point.expected_arrival.format(PROPERTY_TIME_FORMAT).to_string(),
        ));
    }

    properties
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::TripPoint;
    use chrono::NaiveDateTime;

    fn time(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn point(lon: f64, lat: f64, expected: &str) -> TripPoint {
        TripPoint {
            longitude: lon,
            latitude: lat,
            arrival_proximity: "at stop".to_string(),
            distance_from_stop: 150,
            expected_arrival: time(expected),
        }
    }

    fn trip(points: Vec<TripPoint>) -> Trip {
        let start = points[0].expected_arrival;
        let end = points[points.len() - 1].expected_arrival;
        Trip {
            published_line_name: "Line1".to_string(),
            vehicle_ref: "V1".to_string(),
            direction_ref: 0,
            origin_name: "Origin".to_string(),
            destination_name: "Dest".to_string(),
            start_time: start,
            end_time: end,
            points,
        }
    }

    #[test]
    fn test_single_point_trip_is_a_point() {
        let trip = trip(vec![point(-73.9, 40.7, "2017-06-01 10:00:00")]);
        assert_eq!(TripGeometry::of(&trip), TripGeometry::Point([-73.9, 40.7]));
    }

    #[test]
    fn test_multi_point_trip_is_a_line_string() {
        let trip = trip(vec![
            point(-73.9, 40.7, "2017-06-01 10:00:00"),
            point(-73.8, 40.8, "2017-06-01 10:05:00"),
        ]);
        assert_eq!(
            TripGeometry::of(&trip),
            TripGeometry::LineString(vec![[-73.9, 40.7], [-73.8, 40.8]])
        );
    }

    #[test]
    fn test_repeated_points_are_not_deduplicated() {
        let trip = trip(vec![
            point(-73.9, 40.7, "2017-06-01 10:00:00"),
            point(-73.9, 40.7, "2017-06-01 10:05:00"),
            point(-73.9, 40.7, "2017-06-01 10:10:00"),
        ]);
        match TripGeometry::of(&trip) {
            TripGeometry::LineString(coords) => assert_eq!(coords.len(), 3),
            other => panic!("expected a LineString, got {other:?}"),
        }
    }

    #[test]
    fn test_geojson_point_coordinates_are_flat() {
        let geometry = TripGeometry::Point([-73.9, 40.7]).to_geojson();
        assert_eq!(geometry.value, geojson::Value::Point(vec![-73.9, 40.7]));
    }

    #[test]
    fn test_geojson_line_string_coordinates_are_nested() {
        let geometry =
            TripGeometry::LineString(vec![[-73.9, 40.7], [-73.8, 40.8]]).to_geojson();
        assert_eq!(
            geometry.value,
            geojson::Value::LineString(vec![vec![-73.9, 40.7], vec![-73.8, 40.8]])
        );
    }

    #[test]
    fn test_property_count_matches_formula() {
        for n in 1..=4usize {
            let points = (0..n)
                .map(|i| point(-73.9, 40.7, &format!("2017-06-01 10:0{i}:00")))
                .collect();
            let properties = trip_properties(&trip(points));
            assert_eq!(properties.len(), 8 + 4 * n);
        }
    }

    #[test]
    fn test_trip_level_properties_come_first_in_order() {
        let properties = trip_properties(&trip(vec![point(-73.9, 40.7, "2017-06-01 10:00:00")]));
        let keys: Vec<&str> = properties.iter().take(8).map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            [
                "VehicleRef",
                "PublishedLineName",
                "DirectionRef",
                "OriginName",
                "DestinationName",
                "StartTime",
                "EndTime",
                "NumOfPoints",
            ]
        );
    }

    #[test]
    fn test_per_point_properties_are_grouped_in_fixed_order() {
        let properties = trip_properties(&trip(vec![
            point(-73.9, 40.7, "2017-06-01 10:00:00"),
            point(-73.8, 40.8, "2017-06-01 10:05:00"),
        ]));

        let point_two: Vec<&str> = properties[12..16].iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            point_two,
            [
                "Point 2 geom",
                "Point 2 arrival",
                "Point 2 dist from stop",
                "Point 2 time",
            ]
        );
    }

    #[test]
    fn test_property_values_render_as_text() {
        let properties = trip_properties(&trip(vec![point(-73.9, 40.7, "2017-06-01 10:00:00")]));

        assert_eq!(properties[2], ("DirectionRef".to_string(), "0".to_string()));
        assert_eq!(
            properties[5],
            ("StartTime".to_string(), "2017-06-01T10:00:00".to_string())
        );
        assert_eq!(properties[7], ("NumOfPoints".to_string(), "1".to_string()));
        assert_eq!(
            properties[8],
            ("Point 1 geom".to_string(), "POINT(-73.9 40.7)".to_string())
        );
        assert_eq!(
            properties[10],
            ("Point 1 dist from stop".to_string(), "150".to_string())
        );
    }
}
