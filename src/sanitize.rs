//! Row repair for the raw vehicle-position feed.
//!
//! Produces a cleaned sibling CSV (`<stem>_clean.csv`) next to the raw file:
//! the header is preserved verbatim, known corrupted substrings are
//! normalized, `NA` sentinels are blanked, and rows with unparsable or
//! out-of-range coordinates are excluded. A cleaned file left by an earlier
//! run is reused as-is (presence check only — delete it to force a re-clean).

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::{debug, info, warn};

use crate::error::{DataPreparationError, RowValidationError};

/// Safety bound on the number of data rows scanned from the raw feed.
pub const DEFAULT_MAX_ROWS: usize = 100_000;

// Upstream quoting inconsistently wraps this annotation; the embedded comma
// shifts every later field by one column.
const BROKEN_ANNOTATIONS: [&str; 2] = [" ( non-public,for GEO)", " (non-public,for GEO)"];
const FIXED_ANNOTATION: &str = "(non-public for GEO)";

const LATITUDE_COLUMN: &str = "VehicleLocation.Latitude";
const LONGITUDE_COLUMN: &str = "VehicleLocation.Longitude";
const DISTANCE_COLUMN: &str = "DistanceFromStop";
const EXPECTED_ARRIVAL_COLUMN: &str = "ExpectedArrivalTime";

struct ColumnIndexes {
    latitude: usize,
    longitude: usize,
    distance: usize,
    expected_arrival: usize,
}

pub struct Sanitizer {
    raw_path: PathBuf,
    clean_path: PathBuf,
    temp_path: PathBuf,
    max_rows: usize,
}

impl Sanitizer {
    /// # Errors
    ///
    /// Fails if the raw file does not exist.
    pub fn new(raw_path: impl Into<PathBuf>) -> Result<Self, DataPreparationError> {
        let raw_path = raw_path.into();
        if !raw_path.exists() {
            return Err(DataPreparationError::MissingInput(raw_path));
        }

        let stem = raw_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("data");
        let clean_path = raw_path.with_file_name(format!("{stem}_clean.csv"));
        let temp_path = raw_path.with_file_name(format!("{stem}_temp.csv"));

        Ok(Self {
            raw_path,
            clean_path,
            temp_path,
            max_rows: DEFAULT_MAX_ROWS,
        })
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn clean_path(&self) -> &Path {
        &self.clean_path
    }

    /// Produces the cleaned CSV and returns its path, reusing a cleaned file
    /// left by an earlier run if one is present.
    ///
    /// # Errors
    ///
    /// Any I/O failure during read, write, or rename is fatal.
    pub fn run(&self) -> Result<PathBuf, DataPreparationError> {
        if self.clean_path.exists() {
            info!(
                path = %self.clean_path.display(),
                "cleaned file already present, skipping sanitization"
            );
            return Ok(self.clean_path.clone());
        }

        self.clean()?;
        Ok(self.clean_path.clone())
    }

    fn clean(&self) -> Result<(), DataPreparationError> {
        info!(
            path = %self.raw_path.display(),
            max_rows = self.max_rows,
            "cleaning raw data"
        );

        let raw = File::open(&self.raw_path).map_err(|e| io_error(&self.raw_path, e))?;
        let mut lines = BufReader::new(raw).lines();

        let header = match lines.next() {
            Some(line) => line.map_err(|e| io_error(&self.raw_path, e))?,
            None => return Err(DataPreparationError::EmptyInput(self.raw_path.clone())),
        };

        // Substring repair happens on the raw line, before any CSV parsing,
        // so the extra-column corruption never reaches the reader.
        let mut repaired = String::new();
        repaired.push_str(&header);
        repaired.push('\n');

        let mut scanned = 0usize;
        let mut truncated = false;
        for line in lines {
            if scanned == self.max_rows {
                truncated = true;
                break;
            }
            let line = line.map_err(|e| io_error(&self.raw_path, e))?;
            repaired.push_str(&repair_annotations(&line));
            repaired.push('\n');
            scanned += 1;
        }
        if truncated {
            warn!(
                max_rows = self.max_rows,
                "row bound reached, trailing rows were not scanned"
            );
        }

        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_reader(repaired.as_bytes());
        let headers = reader.headers()?.clone();
        let columns = resolve_columns(&headers)?;

        let mut out = File::create(&self.temp_path).map_err(|e| io_error(&self.temp_path, e))?;
        out.write_all(header.as_bytes())
            .and_then(|()| out.write_all(b"\n"))
            .map_err(|e| io_error(&self.temp_path, e))?;

        let mut writer = WriterBuilder::new().from_writer(out);
        let mut kept = 0usize;
        let mut dropped = 0usize;
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let row = (i + 1) as u64;
            match sanitize_row(&record, &columns, headers.len(), row) {
                Ok(clean) => {
                    writer.write_record(&clean)?;
                    kept += 1;
                }
                Err(reason) => {
                    warn!(%reason, "dropping row");
                    dropped += 1;
                }
            }
        }
        writer.flush().map_err(|e| io_error(&self.temp_path, e))?;
        drop(writer);

        fs::rename(&self.temp_path, &self.clean_path)
            .map_err(|e| io_error(&self.clean_path, e))?;

        info!(kept, dropped, path = %self.clean_path.display(), "wrote cleaned file");
        Ok(())
    }
}

fn repair_annotations(line: &str) -> String {
    let mut repaired = line.to_string();
    for broken in BROKEN_ANNOTATIONS {
        if repaired.contains(broken) {
            debug!(variant = broken, "normalizing corrupted annotation");
            repaired = repaired.replace(broken, FIXED_ANNOTATION);
        }
    }
    repaired
}

fn resolve_columns(headers: &StringRecord) -> Result<ColumnIndexes, DataPreparationError> {
    Ok(ColumnIndexes {
        latitude: required_column(headers, LATITUDE_COLUMN)?,
        longitude: required_column(headers, LONGITUDE_COLUMN)?,
        distance: required_column(headers, DISTANCE_COLUMN)?,
        expected_arrival: required_column(headers, EXPECTED_ARRIVAL_COLUMN)?,
    })
}

fn required_column(
    headers: &StringRecord,
    name: &'static str,
) -> Result<usize, DataPreparationError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or(DataPreparationError::MissingColumn(name))
}

fn sanitize_row(
    record: &StringRecord,
    columns: &ColumnIndexes,
    expected_fields: usize,
    row: u64,
) -> Result<StringRecord, RowValidationError> {
    if record.len() != expected_fields {
        return Err(RowValidationError::WrongFieldCount {
            row,
            expected: expected_fields,
            found: record.len(),
        });
    }

    let latitude = parse_coordinate(record, columns.latitude, LATITUDE_COLUMN, row)?;
    let longitude = parse_coordinate(record, columns.longitude, LONGITUDE_COLUMN, row)?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(RowValidationError::CoordinateOutOfRange {
            row,
            latitude,
            longitude,
        });
    }

    let mut clean = StringRecord::new();
    for (i, field) in record.iter().enumerate() {
        let is_na_sentinel =
            (i == columns.distance || i == columns.expected_arrival) && field == "NA";
        clean.push_field(if is_na_sentinel { "" } else { field });
    }
    Ok(clean)
}

fn parse_coordinate(
    record: &StringRecord,
    index: usize,
    column: &'static str,
    row: u64,
) -> Result<f64, RowValidationError> {
    let value = record.get(index).unwrap_or("");
    value
        .parse()
        .map_err(|_| RowValidationError::UnparsableCoordinate {
            row,
            column,
            value: value.to_string(),
        })
}

fn io_error(path: &Path, source: std::io::Error) -> DataPreparationError {
    DataPreparationError::Io {
        path: path.to_path_buf(),
        source,
    }
}
