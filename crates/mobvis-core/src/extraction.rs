use std::io::Read;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::{GaitDataset, MeasurementCondition};
use crate::engine::{run_pipeline, GaitEngine};
use crate::error::Result;
use crate::records::{frame_to_records, Record};
use crate::recording::load_recording;
use crate::shaping::{shape_results, Sentinel, ShapedParameters, ShapingOptions};

/// Recording settings supplied alongside an uploaded CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    pub sampling_rate_hz: i64,
    pub sensor_height_m: f64,
    pub height_m: f64,
    pub measurement_condition: String,
    pub convert_to_ms: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DmoResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_walking_duration: Option<f64>,
    pub per_wb_parameters: Vec<Record>,
    pub per_stride_parameters: Vec<Record>,
    pub aggregate_parameters: Vec<Record>,
}

impl DmoResponse {
    pub fn from_shaped(shaped: &ShapedParameters, sentinel: Sentinel) -> Result<Self> {
        Ok(Self {
            total_walking_duration: shaped.total_walking_duration_h,
            per_wb_parameters: frame_to_records(&shaped.per_wb, sentinel)?,
            per_stride_parameters: frame_to_records(&shaped.per_stride, sentinel)?,
            aggregate_parameters: frame_to_records(&shaped.aggregate, sentinel)?,
        })
    }
}

/// Runs one upload through load → dataset → engine → shaping. The upload is
/// taken by value and released before this returns, whatever the outcome.
pub fn extract_dmos<R: Read>(
    upload: R,
    request: &ExtractionRequest,
    engine: &dyn GaitEngine,
    options: &ShapingOptions,
) -> Result<DmoResponse> {
    request
        .measurement_condition
        .parse::<MeasurementCondition>()?;

    let recording = load_recording(upload, request.convert_to_ms)?;
    info!(
        rows = recording.len(),
        converted_to_ms = request.convert_to_ms,
        "data loaded successfully"
    );

    let dataset = GaitDataset::single(
        recording,
        request.sensor_height_m,
        request.height_m,
        &request.measurement_condition,
        request.sampling_rate_hz,
    )?;
    info!(
        sampling_rate_hz = request.sampling_rate_hz,
        measurement_condition = %request.measurement_condition,
        "gait dataset created successfully"
    );

    let result = run_pipeline(&dataset, engine)?;
    let shaped = shape_results(&result, options)?;
    DmoResponse::from_shaped(&shaped, options.sentinel)
}
