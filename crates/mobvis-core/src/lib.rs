//! DMO extraction: IMU CSV → single-record gait dataset → gait engine →
//! client-facing per-bout, per-stride and aggregate parameter tables.

pub mod aggregate;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod extraction;
pub mod records;
pub mod recording;
pub mod shaping;

pub use dataset::{GaitDataset, GaitRecord, MeasurementCondition};
pub use engine::{
    run_pipeline, EngineError, FixtureEngine, GaitEngine, PipelineResult, PipelineVariant,
    ProcessEngine, ProcessEngineConfig,
};
pub use error::{ExtractionError, NO_GAIT_PARAMETERS_MESSAGE};
pub use extraction::{extract_dmos, DmoResponse, ExtractionRequest};
pub use recording::{load_recording, Recording, GRAV_MS2};
pub use shaping::{shape_results, Sentinel, ShapingOptions};
