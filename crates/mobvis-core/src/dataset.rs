use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ExtractionError, Result};
use crate::recording::Recording;

pub const COHORT: &str = "MS";
pub const RECORD_ID: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementCondition {
    Laboratory,
    FreeLiving,
}

impl MeasurementCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementCondition::Laboratory => "laboratory",
            MeasurementCondition::FreeLiving => "free_living",
        }
    }
}

impl fmt::Display for MeasurementCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasurementCondition {
    type Err = ExtractionError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "laboratory" => Ok(MeasurementCondition::Laboratory),
            "free_living" => Ok(MeasurementCondition::FreeLiving),
            _ => Err(ExtractionError::Validation(
                "measurement_condition must be either 'laboratory' or 'free_living'".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantMetadata {
    pub cohort: String,
    pub sensor_height_m: f64,
    pub height_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub measurement_condition: MeasurementCondition,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub cohort: String,
    pub id: String,
}

/// A single recording with everything the gait engine needs to process it.
#[derive(Debug, Clone)]
pub struct GaitRecord {
    pub key: RecordKey,
    pub recording: Recording,
    pub participant_metadata: ParticipantMetadata,
    pub recording_metadata: RecordingMetadata,
    pub sampling_rate_hz: u32,
}

#[derive(Debug, Clone, Default)]
pub struct GaitDataset {
    records: Vec<GaitRecord>,
}

impl GaitDataset {
    /// Wraps one recording into the single-entry dataset keyed `("MS", "1")`.
    pub fn single(
        recording: Recording,
        sensor_height_m: f64,
        height_m: f64,
        measurement_condition: &str,
        sampling_rate_hz: i64,
    ) -> Result<Self> {
        let measurement_condition = measurement_condition.parse::<MeasurementCondition>()?;
        ensure_positive("sensor_height_m", sensor_height_m)?;
        ensure_positive("height_m", height_m)?;
        let sampling_rate_hz = validate_sampling_rate(sampling_rate_hz)?;

        let record = GaitRecord {
            key: RecordKey {
                cohort: COHORT.to_string(),
                id: RECORD_ID.to_string(),
            },
            recording,
            participant_metadata: ParticipantMetadata {
                cohort: COHORT.to_string(),
                sensor_height_m,
                height_m,
            },
            recording_metadata: RecordingMetadata {
                measurement_condition,
            },
            sampling_rate_hz,
        };

        Ok(Self {
            records: vec![record],
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[GaitRecord] {
        &self.records
    }

    pub fn get(&self, key: &RecordKey) -> Option<&GaitRecord> {
        self.records.iter().find(|record| &record.key == key)
    }

    #[cfg(test)]
    pub(crate) fn push(&mut self, record: GaitRecord) {
        self.records.push(record);
    }
}

fn ensure_positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ExtractionError::Validation(format!(
            "{field} must be a positive number of metres, got {value}"
        )))
    }
}

fn validate_sampling_rate(value: i64) -> Result<u32> {
    match u32::try_from(value) {
        Ok(rate) if rate > 0 => Ok(rate),
        _ => Err(ExtractionError::Validation(format!(
            "sampling_rate_hz must be a positive integer, got {value}"
        ))),
    }
}
