//! The gait-analysis engine boundary.
//!
//! Gait-event detection and parameter estimation are not implemented here; an
//! engine is anything that turns one [`GaitRecord`] into a [`PipelineResult`].

mod fixture;
mod process;
pub mod wire;

use std::fmt;
use std::str::FromStr;

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::dataset::{GaitDataset, GaitRecord};
use crate::error::{ExtractionError, Result};

pub use fixture::FixtureEngine;
pub use process::{ProcessEngine, ProcessEngineConfig};

#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine ran and raised; the message is the engine's own.
    #[error("{0}")]
    Failed(String),

    #[error("failed to launch gait engine '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("gait engine I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("gait engine returned malformed output: {0}")]
    Protocol(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineVariant {
    #[default]
    Impaired,
    Healthy,
}

impl PipelineVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineVariant::Impaired => "impaired",
            PipelineVariant::Healthy => "healthy",
        }
    }
}

impl fmt::Display for PipelineVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineVariant {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "impaired" => Ok(PipelineVariant::Impaired),
            "healthy" => Ok(PipelineVariant::Healthy),
            other => Err(format!(
                "unknown pipeline variant '{other}', expected 'impaired' or 'healthy'"
            )),
        }
    }
}

/// A table plus its row index, kept apart because polars frames carry none.
#[derive(Debug, Clone)]
pub struct IndexedFrame<K> {
    pub index: Vec<K>,
    pub frame: DataFrame,
}

impl<K> IndexedFrame<K> {
    pub fn new(index: Vec<K>, frame: DataFrame) -> std::result::Result<Self, EngineError> {
        if index.len() != frame.height() {
            return Err(EngineError::Protocol(format!(
                "index has {} entries but table has {} rows",
                index.len(),
                frame.height()
            )));
        }
        Ok(Self { index, frame })
    }

    pub fn empty() -> Self {
        Self {
            index: Vec::new(),
            frame: DataFrame::default(),
        }
    }

    pub fn height(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Per-stride row key: bout id plus the engine's `"{bout}_{stride}"` stride id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrideKey {
    pub wb_id: i64,
    pub s_id: String,
}

impl StrideKey {
    pub fn new(wb_id: i64, s_id: impl Into<String>) -> Self {
        Self {
            wb_id,
            s_id: s_id.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub per_wb_parameters: IndexedFrame<i64>,
    pub per_stride_parameters: IndexedFrame<StrideKey>,
    pub aggregated_parameters: IndexedFrame<String>,
}

pub trait GaitEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Blocking, CPU-bound run of the full pipeline over one record.
    fn run(&self, record: &GaitRecord) -> std::result::Result<PipelineResult, EngineError>;
}

/// Runs the engine over the sole record of `dataset`. Engine failures are
/// returned as [`ExtractionError::Engine`] with the engine's message intact.
pub fn run_pipeline(dataset: &GaitDataset, engine: &dyn GaitEngine) -> Result<PipelineResult> {
    let record = match dataset.records() {
        [record] => record,
        records => {
            return Err(ExtractionError::Validation(format!(
                "expected a dataset with exactly one record, found {}",
                records.len()
            )))
        }
    };

    let result = engine.run(record)?;
    info!(
        engine = engine.name(),
        walking_bouts = result.per_wb_parameters.height(),
        strides = result.per_stride_parameters.height(),
        "ran pipeline successfully"
    );
    Ok(result)
}
