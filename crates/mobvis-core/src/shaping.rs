use std::fmt;
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregate::{calculate_aggregate_parameters, is_numeric};
use crate::engine::{IndexedFrame, PipelineResult, StrideKey};
use crate::error::{ExtractionError, Result};

pub const PER_WB_INTERNAL_COLUMNS: [&str; 2] = ["rule_name", "rule_obj"];
pub const PER_STRIDE_INTERNAL_COLUMNS: [&str; 1] = ["original_gs_id"];
pub const ALL_WBS_ROW: &str = "all_wbs";
pub const TOTAL_WALKING_DURATION_COLUMN: &str = "total_walking_duration_h";

/// Stand-in for a parameter the engine could not compute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Sentinel {
    #[default]
    Zero,
    MinusOne,
}

impl Sentinel {
    pub fn as_i64(self) -> i64 {
        match self {
            Sentinel::Zero => 0,
            Sentinel::MinusOne => -1,
        }
    }

    pub fn as_f64(self) -> f64 {
        self.as_i64() as f64
    }

    pub fn to_json(self) -> Value {
        Value::from(self.as_i64())
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i64())
    }
}

impl TryFrom<i64> for Sentinel {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Sentinel::Zero),
            -1 => Ok(Sentinel::MinusOne),
            other => Err(format!("sentinel must be 0 or -1, got {other}")),
        }
    }
}

impl From<Sentinel> for i64 {
    fn from(sentinel: Sentinel) -> Self {
        sentinel.as_i64()
    }
}

impl FromStr for Sentinel {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let parsed = value
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("sentinel must be 0 or -1, got '{value}'"))?;
        Sentinel::try_from(parsed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShapingOptions {
    pub sentinel: Sentinel,
    pub include_total_duration: bool,
}

#[derive(Debug, Clone)]
pub struct ShapedParameters {
    pub per_wb: DataFrame,
    pub per_stride: DataFrame,
    pub aggregate: DataFrame,
    pub total_walking_duration_h: Option<f64>,
}

/// Turns raw engine tables into the client-facing ones: bookkeeping columns
/// dropped, missing values replaced by the sentinel, `wb_id`/`s_id` derived
/// from the row index, and aggregate statistics computed from the per-bout table.
pub fn shape_results(result: &PipelineResult, options: &ShapingOptions) -> Result<ShapedParameters> {
    let sentinel = options.sentinel;

    if result.per_wb_parameters.is_empty() {
        return Err(ExtractionError::EmptyResult);
    }

    let per_wb = shape_per_wb(&result.per_wb_parameters, sentinel)?;
    let per_stride = shape_per_stride(&result.per_stride_parameters, sentinel)?;
    let aggregate = fill_missing(&calculate_aggregate_parameters(&per_wb)?, sentinel)?;

    let total_walking_duration_h = if options.include_total_duration {
        Some(total_walking_duration(&result.aggregated_parameters, sentinel)?)
    } else {
        None
    };

    Ok(ShapedParameters {
        per_wb,
        per_stride,
        aggregate,
        total_walking_duration_h,
    })
}

fn shape_per_wb(table: &IndexedFrame<i64>, sentinel: Sentinel) -> Result<DataFrame> {
    let mut df = fill_missing(&drop_columns(&table.frame, &PER_WB_INTERNAL_COLUMNS)?, sentinel)?;
    df.with_column(Series::new("wb_id".into(), table.index.clone()))?;
    Ok(df)
}

fn shape_per_stride(table: &IndexedFrame<StrideKey>, sentinel: Sentinel) -> Result<DataFrame> {
    let mut df = fill_missing(
        &drop_columns(&table.frame, &PER_STRIDE_INTERNAL_COLUMNS)?,
        sentinel,
    )?;

    let s_ids = table
        .index
        .iter()
        .map(|key| stride_number(&key.s_id))
        .collect::<Result<Vec<u64>>>()?;
    let wb_ids: Vec<i64> = table.index.iter().map(|key| key.wb_id).collect();

    df.with_column(Series::new("s_id".into(), s_ids))?;
    df.with_column(Series::new("wb_id".into(), wb_ids))?;
    Ok(df)
}

/// Extracts the stride number from an engine stride id of the form
/// `"<wb>_<stride>"`.
pub fn stride_number(s_id: &str) -> Result<u64> {
    let malformed = || {
        ExtractionError::Format(format!(
            "stride id '{s_id}' is not of the form '<wb_id>_<stride_id>'"
        ))
    };

    let mut parts = s_id.split('_');
    let (Some(wb_part), Some(stride_part), None) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed());
    };
    if wb_part.parse::<u64>().is_err() {
        return Err(malformed());
    }
    stride_part.parse::<u64>().map_err(|_| malformed())
}

fn total_walking_duration(aggregated: &IndexedFrame<String>, sentinel: Sentinel) -> Result<f64> {
    let row = aggregated
        .index
        .iter()
        .position(|key| key == ALL_WBS_ROW)
        .ok_or_else(|| {
            ExtractionError::Format(format!(
                "aggregated parameters have no '{ALL_WBS_ROW}' row"
            ))
        })?;

    let column = aggregated
        .frame
        .column(TOTAL_WALKING_DURATION_COLUMN)
        .map_err(|_| {
            ExtractionError::Format(format!(
                "aggregated parameters have no '{TOTAL_WALKING_DURATION_COLUMN}' column"
            ))
        })?;
    let values = column.cast(&DataType::Float64)?;
    let value = values.f64()?.get(row);

    Ok(value
        .filter(|hours| !hours.is_nan())
        .unwrap_or_else(|| sentinel.as_f64()))
}

fn drop_columns(df: &DataFrame, names: &[&str]) -> PolarsResult<DataFrame> {
    let kept: Vec<Column> = df
        .get_columns()
        .iter()
        .filter(|column| !names.contains(&column.name().as_str()))
        .cloned()
        .collect();
    DataFrame::new(kept)
}

/// Replaces null and NaN entries of numeric columns with the sentinel.
/// Float columns come back as Float64; integer columns keep their integer
/// type unless they held nulls, in which case they become Int64.
pub fn fill_missing(df: &DataFrame, sentinel: Sentinel) -> PolarsResult<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(df.width());

    for column in df.get_columns() {
        let dtype = column.dtype();
        let filled = if matches!(dtype, DataType::Float32 | DataType::Float64) {
            let cast = column.cast(&DataType::Float64)?;
            let values: Vec<f64> = cast
                .f64()?
                .into_iter()
                .map(|value| match value {
                    Some(v) if !v.is_nan() => v,
                    _ => sentinel.as_f64(),
                })
                .collect();
            Series::new(column.name().clone(), values).into()
        } else if is_numeric(dtype) && column.null_count() > 0 {
            let cast = column.cast(&DataType::Int64)?;
            let values: Vec<i64> = cast
                .i64()?
                .into_iter()
                .map(|value| value.unwrap_or(sentinel.as_i64()))
                .collect();
            Series::new(column.name().clone(), values).into()
        } else {
            column.clone()
        };
        columns.push(filled);
    }

    DataFrame::new(columns)
}
