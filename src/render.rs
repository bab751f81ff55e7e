//! Serializes trips into a schema-validated GeoJSON FeatureCollection.
//!
//! Construction goes through the `geojson` crate's types; the serialized
//! text is then checked against the FeatureCollection schema rules before it
//! leaves the system, so a caller never receives malformed geography.

use std::sync::Arc;

use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use serde_json::Value;
use tracing::debug;

use crate::error::{InvalidGeoJsonError, RenderError};
use crate::geometry::{TripGeometry, trip_properties};
use crate::segment::Trip;

/// Renders the trips as one FeatureCollection document, in input order.
///
/// Rendering the same trips twice yields byte-identical text.
///
/// # Errors
///
/// [`RenderError::Serialization`] if JSON encoding fails,
/// [`RenderError::InvalidGeoJson`] if the serialized document violates the
/// FeatureCollection schema.
pub fn render_feature_collection(trips: &[Arc<Trip>]) -> Result<String, RenderError> {
    let features = trips.iter().map(|trip| build_feature(trip)).collect();
    let collection = GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    });

    let document = serde_json::to_string_pretty(&collection)?;
    validate_document(&document)?;

    debug!(trips = trips.len(), bytes = document.len(), "rendered feature collection");
    Ok(document)
}

fn build_feature(trip: &Trip) -> Feature {
    // Property insertion order is preserved through serialization, keeping
    // the 8 + 4N layout intact in the output object.
    let mut properties = JsonObject::new();
    for (key, value) in trip_properties(trip) {
        properties.insert(key, JsonValue::String(value));
    }

    Feature {
        bbox: None,
        geometry: Some(TripGeometry::of(trip).to_geojson()),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Checks a serialized document against the GeoJSON FeatureCollection schema
/// rules, collecting every violation rather than stopping at the first.
///
/// # Errors
///
/// A non-empty violation set is returned as [`InvalidGeoJsonError`] together
/// with the offending document.
pub fn validate_document(document: &str) -> Result<(), InvalidGeoJsonError> {
    let value: Value = match serde_json::from_str(document) {
        Ok(value) => value,
        Err(reason) => {
            return Err(InvalidGeoJsonError {
                messages: vec![format!("/: not parseable as JSON: {reason}")],
                document: Value::Null,
            });
        }
    };

    let mut messages = Vec::new();
    check_feature_collection(&value, &mut messages);

    // Conformance backstop: the whole document must round-trip through the
    // geojson parser as well.
    if let Err(reason) = document.parse::<GeoJson>() {
        messages.push(format!("/: {reason}"));
    }

    if messages.is_empty() {
        Ok(())
    } else {
        Err(InvalidGeoJsonError {
            messages,
            document: value,
        })
    }
}

fn check_feature_collection(value: &Value, messages: &mut Vec<String>) {
    let Some(object) = value.as_object() else {
        messages.push("/: document is not a JSON object".to_string());
        return;
    };

    if object.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        messages.push(format!(
            "/type: expected \"FeatureCollection\", found {:?}",
            object.get("type")
        ));
    }

    match object.get("features").and_then(Value::as_array) {
        Some(features) => {
            for (i, feature) in features.iter().enumerate() {
                check_feature(feature, i, messages);
            }
        }
        None => messages.push("/features: missing or not an array".to_string()),
    }
}

fn check_feature(value: &Value, index: usize, messages: &mut Vec<String>) {
    let path = format!("/features/{index}");
    let Some(object) = value.as_object() else {
        messages.push(format!("{path}: feature is not a JSON object"));
        return;
    };

    if object.get("type").and_then(Value::as_str) != Some("Feature") {
        messages.push(format!("{path}/type: expected \"Feature\""));
    }
    if !object.contains_key("properties") {
        messages.push(format!("{path}/properties: missing member"));
    }
    match object.get("geometry") {
        Some(geometry) => check_geometry(geometry, &path, messages),
        None => messages.push(format!("{path}/geometry: missing member")),
    }
}

fn check_geometry(value: &Value, feature_path: &str, messages: &mut Vec<String>) {
    let path = format!("{feature_path}/geometry");
    let Some(object) = value.as_object() else {
        messages.push(format!("{path}: geometry is not a JSON object"));
        return;
    };

    match object.get("type").and_then(Value::as_str) {
        Some("Point") => match object.get("coordinates") {
            Some(position) => check_position(position, &format!("{path}/coordinates"), messages),
            None => messages.push(format!("{path}/coordinates: missing member")),
        },
        Some("LineString") => match object.get("coordinates").and_then(Value::as_array) {
            Some(positions) => {
                if positions.len() < 2 {
                    messages.push(format!(
                        "{path}/coordinates: a LineString needs at least 2 positions"
                    ));
                }
                for (i, position) in positions.iter().enumerate() {
                    check_position(position, &format!("{path}/coordinates/{i}"), messages);
                }
            }
            None => messages.push(format!("{path}/coordinates: missing or not an array")),
        },
        other => messages.push(format!("{path}/type: unsupported geometry type {other:?}")),
    }
}

fn check_position(value: &Value, path: &str, messages: &mut Vec<String>) {
    match value.as_array() {
        Some(position) if position.len() >= 2 => {
            for (i, number) in position.iter().enumerate() {
                if !number.is_number() {
                    messages.push(format!("{path}/{i}: not a number"));
                }
            }
        }
        Some(_) => messages.push(format!("{path}: a position needs at least 2 numbers")),
        None => messages.push(format!("{path}: not an array")),
    }
}
