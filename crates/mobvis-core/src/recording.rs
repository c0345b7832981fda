use std::io::Read;

use csv::ReaderBuilder;
use polars::prelude::*;
use tracing::debug;

use crate::error::{ExtractionError, Result};

/// Standard gravity in m/s².
pub const GRAV_MS2: f64 = 9.80665;

pub const SAMPLES_COLUMN: &str = "samples";
pub const ACC_COLUMNS: [&str; 3] = ["acc_x", "acc_y", "acc_z"];
pub const GYR_COLUMNS: [&str; 3] = ["gyr_x", "gyr_y", "gyr_z"];

pub const RECORDING_COLUMNS: [&str; 7] = [
    SAMPLES_COLUMN,
    "acc_x",
    "acc_y",
    "acc_z",
    "gyr_x",
    "gyr_y",
    "gyr_z",
];

/// One IMU recording from the lower-back sensor. Acceleration is in m/s².
#[derive(Debug, Clone)]
pub struct Recording {
    df: DataFrame,
}

impl Recording {
    pub fn df(&self) -> &DataFrame {
        &self.df
    }

    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn samples(&self) -> Result<Vec<i64>> {
        let ca = self.df.column(SAMPLES_COLUMN)?.i64()?;
        Ok(ca.into_iter().map(|value| value.unwrap_or_default()).collect())
    }

    pub fn channel(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let ca = self.df.column(name)?.f64()?;
        Ok(ca.into_iter().collect())
    }
}

/// Reads an uploaded CSV into a [`Recording`]. The reader is consumed and
/// dropped before this function returns, on success and failure alike.
pub fn load_recording<R: Read>(reader: R, convert_to_ms: bool) -> Result<Recording> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = reader.headers()?.clone();
    let mut positions = [0usize; RECORDING_COLUMNS.len()];
    let mut missing = Vec::new();
    for (slot, column) in positions.iter_mut().zip(RECORDING_COLUMNS) {
        match headers.iter().position(|header| header == column) {
            Some(idx) => *slot = idx,
            None => missing.push(column),
        }
    }
    if !missing.is_empty() {
        return Err(ExtractionError::Format(format!(
            "CSV is missing required column(s): {}; expected columns {}",
            missing.join(", "),
            RECORDING_COLUMNS.join(", ")
        )));
    }

    let ignored: Vec<&str> = headers
        .iter()
        .filter(|header| !RECORDING_COLUMNS.contains(header))
        .collect();
    if !ignored.is_empty() {
        debug!(columns = ?ignored, "ignoring extra CSV columns");
    }

    let mut samples: Vec<i64> = Vec::new();
    let mut channels: [Vec<Option<f64>>; 6] = Default::default();

    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        let line_index = row_idx + 1;

        let raw = record.get(positions[0]).unwrap_or_default();
        samples.push(parse_sample_index(raw, line_index)?);

        for (channel, (&position, column)) in channels
            .iter_mut()
            .zip(positions[1..].iter().zip(&RECORDING_COLUMNS[1..]))
        {
            let raw = record.get(position).unwrap_or_default();
            channel.push(parse_optional_f64(raw, line_index, column)?);
        }
    }

    if samples.is_empty() {
        return Err(ExtractionError::Format(
            "CSV did not contain any data rows".to_string(),
        ));
    }

    if convert_to_ms {
        for channel in channels.iter_mut().take(ACC_COLUMNS.len()) {
            for value in channel.iter_mut().flatten() {
                *value *= GRAV_MS2;
            }
        }
    }

    let mut columns: Vec<Column> = Vec::with_capacity(RECORDING_COLUMNS.len());
    columns.push(Series::new(SAMPLES_COLUMN.into(), samples).into());
    for (name, values) in RECORDING_COLUMNS[1..].iter().zip(channels) {
        columns.push(Series::new((*name).into(), values).into());
    }

    let df = DataFrame::new(columns)?;
    Ok(Recording { df })
}

fn parse_sample_index(value: &str, line_index: usize) -> Result<i64> {
    if let Ok(parsed) = value.parse::<i64>() {
        return Ok(parsed);
    }
    // pandas writes integer columns that once held NaN as "12.0"
    match value.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() && parsed.fract() == 0.0 => Ok(parsed as i64),
        _ => Err(ExtractionError::Format(format!(
            "data line {line_index}: failed to parse column '{SAMPLES_COLUMN}' as integer: '{value}'"
        ))),
    }
}

fn parse_optional_f64(value: &str, line_index: usize, column: &str) -> Result<Option<f64>> {
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    value.parse::<f64>().map(Some).map_err(|err| {
        ExtractionError::Format(format!(
            "data line {line_index}: failed to parse column '{column}' as float: {err}"
        ))
    })
}
