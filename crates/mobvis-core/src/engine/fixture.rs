use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use polars::prelude::*;

use super::{EngineError, GaitEngine, IndexedFrame, PipelineResult, StrideKey};
use crate::dataset::GaitRecord;

#[derive(Debug)]
enum Outcome {
    Result(PipelineResult),
    Failure(String),
}

/// Engine double that replays a canned result or failure, for exercising
/// everything around the gait pipeline without running it.
#[derive(Debug)]
pub struct FixtureEngine {
    outcome: Outcome,
    runs: AtomicUsize,
    last_record: Mutex<Option<GaitRecord>>,
}

impl FixtureEngine {
    pub fn returning(result: PipelineResult) -> Self {
        Self::with_outcome(Outcome::Result(result))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_outcome(Outcome::Failure(message.into()))
    }

    /// Three walking bouts and five strides with a few missing values and the
    /// engine's bookkeeping columns still attached.
    pub fn sample() -> Result<Self, PolarsError> {
        Ok(Self::returning(Self::sample_result()?))
    }

    /// The tables [`FixtureEngine::sample`] replays, for tests that need to
    /// tamper with them first.
    pub fn sample_result() -> Result<PipelineResult, PolarsError> {
        sample_result()
    }

    /// An engine that detects no walking at all.
    pub fn without_walking_bouts() -> Self {
        Self::returning(PipelineResult {
            per_wb_parameters: IndexedFrame::empty(),
            per_stride_parameters: IndexedFrame::empty(),
            aggregated_parameters: IndexedFrame::empty(),
        })
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn last_record(&self) -> Option<GaitRecord> {
        self.last_record.lock().ok().and_then(|slot| slot.clone())
    }

    fn with_outcome(outcome: Outcome) -> Self {
        Self {
            outcome,
            runs: AtomicUsize::new(0),
            last_record: Mutex::new(None),
        }
    }
}

impl GaitEngine for FixtureEngine {
    fn name(&self) -> &'static str {
        "fixture"
    }

    fn run(&self, record: &GaitRecord) -> Result<PipelineResult, EngineError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut slot) = self.last_record.lock() {
            *slot = Some(record.clone());
        }

        match &self.outcome {
            Outcome::Result(result) => Ok(result.clone()),
            Outcome::Failure(message) => Err(EngineError::Failed(message.clone())),
        }
    }
}

fn sample_result() -> Result<PipelineResult, PolarsError> {
    let per_wb = DataFrame::new(vec![
        Series::new("start".into(), vec![120i64, 1510, 4230]).into(),
        Series::new("end".into(), vec![1420i64, 3890, 5610]).into(),
        Series::new("n_strides".into(), vec![6i64, 12, 7]).into(),
        Series::new("duration_s".into(), vec![13.0f64, 23.8, 13.8]).into(),
        Series::new("stride_duration_s".into(), vec![1.12f64, 1.05, f64::NAN]).into(),
        Series::new("stride_length_m".into(), vec![Some(1.21f64), None, Some(1.16)]).into(),
        Series::new("walking_speed_mps".into(), vec![Some(1.08f64), Some(1.19), None]).into(),
        Series::new("cadence_spm".into(), vec![107.1f64, 114.3, 103.2]).into(),
        Series::new(
            "rule_name".into(),
            vec!["min_strides", "max_break", "min_strides"],
        )
        .into(),
        Series::new(
            "rule_obj".into(),
            vec!["MaxBreakCriteria", "NStridesCriteria", "MaxBreakCriteria"],
        )
        .into(),
    ])?;

    let per_stride = DataFrame::new(vec![
        Series::new("start".into(), vec![120i64, 232, 1510, 1615, 4230]).into(),
        Series::new("end".into(), vec![232i64, 345, 1615, 1721, 4344]).into(),
        Series::new(
            "lr_label".into(),
            vec![Some("left"), Some("right"), Some("left"), Some("right"), None],
        )
        .into(),
        Series::new("original_gs_id".into(), vec![0i64, 0, 1, 1, 2]).into(),
        Series::new("cadence_spm".into(), vec![106.0f64, 108.2, 113.9, 114.8, 103.2]).into(),
        Series::new("stride_duration_s".into(), vec![1.13f64, 1.11, 1.05, 1.05, f64::NAN])
            .into(),
        Series::new(
            "stride_length_m".into(),
            vec![Some(1.2f64), Some(1.22), None, Some(1.3), Some(1.16)],
        )
        .into(),
        Series::new(
            "walking_speed_mps".into(),
            vec![Some(1.06f64), Some(1.1), None, Some(1.24), None],
        )
        .into(),
    ])?;

    let aggregated = DataFrame::new(vec![
        Series::new("total_walking_duration_h".into(), vec![0.014_5f64]).into(),
        Series::new("wb_all__count".into(), vec![3i64]).into(),
    ])?;

    let stride_index = vec![
        StrideKey::new(0, "0_0"),
        StrideKey::new(0, "0_1"),
        StrideKey::new(1, "1_0"),
        StrideKey::new(1, "1_1"),
        StrideKey::new(2, "2_0"),
    ];

    let to_polars = |err: EngineError| PolarsError::ComputeError(err.to_string().into());
    Ok(PipelineResult {
        per_wb_parameters: IndexedFrame::new(vec![0, 1, 2], per_wb).map_err(to_polars)?,
        per_stride_parameters: IndexedFrame::new(stride_index, per_stride).map_err(to_polars)?,
        aggregated_parameters: IndexedFrame::new(vec!["all_wbs".to_string()], aggregated)
            .map_err(to_polars)?,
    })
}
