//! Typed errors for the ingestion and rendering pipeline.
//!
//! Row-level defects are recovered locally (the row is dropped and logged);
//! everything else propagates to the caller with no retry.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal failure while preparing the dataset (sanitize or parse stage).
///
/// Any of these aborts initialization; there is no partial-success mode.
#[derive(Debug, Error)]
pub enum DataPreparationError {
    #[error("raw data file does not exist at {}", .0.display())]
    MissingInput(PathBuf),

    #[error("raw data file {} has no header line", .0.display())]
    EmptyInput(PathBuf),

    #[error("required column {0:?} is missing from the header")]
    MissingColumn(&'static str),

    #[error("I/O failure on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV failure: {0}")]
    Csv(#[from] csv::Error),
}

/// Per-row defect found during sanitization. The row is excluded from the
/// cleaned output; processing continues.
#[derive(Debug, Error)]
pub enum RowValidationError {
    #[error("row {row}: {column} {value:?} is not a valid number")]
    UnparsableCoordinate {
        row: u64,
        column: &'static str,
        value: String,
    },

    #[error("row {row}: coordinates ({latitude}, {longitude}) are out of range")]
    CoordinateOutOfRange {
        row: u64,
        latitude: f64,
        longitude: f64,
    },

    #[error("row {row}: expected {expected} fields, found {found}")]
    WrongFieldCount { row: u64, expected: usize, found: usize },
}

/// Query by a route name or vehicle id that was never indexed.
#[derive(Debug, Error)]
#[error("no trips indexed under {key:?}")]
pub struct NotFoundError {
    pub key: String,
}

/// The rendered FeatureCollection failed GeoJSON schema validation.
///
/// Carries every violation message and the offending document so the caller
/// can log the full picture. The document is never returned to a client.
#[derive(Debug, Error)]
#[error("invalid GeoJSON ({} violations): {}", .messages.len(), .messages.join("; "))]
pub struct InvalidGeoJsonError {
    pub messages: Vec<String>,
    pub document: serde_json::Value,
}

/// Failure while turning trips into a GeoJSON document.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    InvalidGeoJson(#[from] InvalidGeoJsonError),

    #[error("GeoJSON serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_the_key() {
        let err = NotFoundError {
            key: "NoSuchLine".to_string(),
        };
        assert_eq!(err.to_string(), "no trips indexed under \"NoSuchLine\"");
    }

    #[test]
    fn test_invalid_geojson_message_joins_violations() {
        let err = InvalidGeoJsonError {
            messages: vec!["/type: missing".to_string(), "/features: not an array".to_string()],
            document: serde_json::json!({}),
        };
        let text = err.to_string();
        assert!(text.contains("2 violations"));
        assert!(text.contains("/type: missing"));
        assert!(text.contains("/features: not an array"));
    }

    #[test]
    fn test_render_error_distinguishes_serialization() {
        let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = RenderError::from(bad);
        assert!(matches!(err, RenderError::Serialization(_)));
    }
}
