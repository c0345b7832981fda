//! JSON exchange format spoken with out-of-process engines.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{EngineError, IndexedFrame, PipelineResult, PipelineVariant, StrideKey};
use crate::dataset::{GaitRecord, ParticipantMetadata, RecordKey, RecordingMetadata};
use crate::records::any_value_to_json;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireColumn {
    pub name: String,
    pub values: Vec<Value>,
}

/// A column-oriented table. Multi-level index entries are JSON arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireTable {
    #[serde(default)]
    pub index_names: Vec<String>,
    #[serde(default)]
    pub index: Vec<Value>,
    pub columns: Vec<WireColumn>,
}

#[derive(Debug, Serialize)]
pub struct EngineRequest<'a> {
    pub pipeline: PipelineVariant,
    pub record: &'a RecordKey,
    pub sampling_rate_hz: u32,
    pub participant_metadata: &'a ParticipantMetadata,
    pub recording_metadata: &'a RecordingMetadata,
    pub data: WireTable,
}

impl<'a> EngineRequest<'a> {
    pub fn new(pipeline: PipelineVariant, record: &'a GaitRecord) -> Result<Self, EngineError> {
        Ok(Self {
            pipeline,
            record: &record.key,
            sampling_rate_hz: record.sampling_rate_hz,
            participant_metadata: &record.participant_metadata,
            recording_metadata: &record.recording_metadata,
            data: frame_to_wire(record.recording.df())?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineResponse {
    pub per_wb_parameters: WireTable,
    pub per_stride_parameters: WireTable,
    pub aggregated_parameters: WireTable,
}

impl EngineResponse {
    pub fn into_result(self) -> Result<PipelineResult, EngineError> {
        let per_wb_parameters = decode_table(self.per_wb_parameters, "per_wb_parameters", |value| {
            value_as_i64(value).ok_or_else(|| format!("expected integer wb_id, found {value}"))
        })?;

        let (wb_level, s_level) = stride_levels(&self.per_stride_parameters.index_names)?;
        let per_stride_parameters =
            decode_table(self.per_stride_parameters, "per_stride_parameters", |value| {
                let levels = value
                    .as_array()
                    .filter(|levels| levels.len() > wb_level.max(s_level))
                    .ok_or_else(|| {
                        format!("expected index entry with wb_id and s_id levels, found {value}")
                    })?;
                let wb_id = value_as_i64(&levels[wb_level])
                    .ok_or_else(|| format!("expected integer wb_id, found {}", levels[wb_level]))?;
                let s_id = value_as_label(&levels[s_level]);
                Ok(StrideKey { wb_id, s_id })
            })?;

        let aggregated_parameters =
            decode_table(self.aggregated_parameters, "aggregated_parameters", |value| {
                Ok(value_as_label(value))
            })?;

        Ok(PipelineResult {
            per_wb_parameters,
            per_stride_parameters,
            aggregated_parameters,
        })
    }
}

pub fn frame_to_wire(df: &DataFrame) -> Result<WireTable, EngineError> {
    let mut columns = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let mut values = Vec::with_capacity(column.len());
        for idx in 0..column.len() {
            let value = column
                .get(idx)
                .map_err(|err| EngineError::Protocol(err.to_string()))?;
            values.push(any_value_to_json(&value).unwrap_or(Value::Null));
        }
        columns.push(WireColumn {
            name: column.name().to_string(),
            values,
        });
    }

    Ok(WireTable {
        index_names: Vec::new(),
        index: (0..df.height()).map(Value::from).collect(),
        columns,
    })
}

/// Positions of the `wb_id` and `s_id` levels in a per-stride index entry.
/// Unnamed indexes are taken to be exactly `[wb_id, s_id]`.
fn stride_levels(index_names: &[String]) -> Result<(usize, usize), EngineError> {
    if index_names.is_empty() {
        return Ok((0, 1));
    }
    let position = |level: &str| {
        index_names
            .iter()
            .position(|name| name == level)
            .ok_or_else(|| {
                EngineError::Protocol(format!(
                    "per_stride_parameters: index has no '{level}' level, found {index_names:?}"
                ))
            })
    };
    Ok((position("wb_id")?, position("s_id")?))
}

fn decode_table<K, F>(
    table: WireTable,
    label: &str,
    decode_key: F,
) -> Result<IndexedFrame<K>, EngineError>
where
    F: Fn(&Value) -> Result<K, String>,
{
    let index = table
        .index
        .iter()
        .map(&decode_key)
        .collect::<Result<Vec<K>, String>>()
        .map_err(|message| EngineError::Protocol(format!("{label}: {message}")))?;

    if table.columns.is_empty() {
        if !index.is_empty() {
            return Err(EngineError::Protocol(format!(
                "{label}: {} index entries but no columns",
                index.len()
            )));
        }
        return Ok(IndexedFrame::empty());
    }

    let mut columns: Vec<Column> = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        if column.values.len() != index.len() {
            return Err(EngineError::Protocol(format!(
                "{label}: column '{}' has {} values, expected {}",
                column.name,
                column.values.len(),
                index.len()
            )));
        }
        columns.push(values_to_series(&column.name, &column.values).into());
    }

    let frame = DataFrame::new(columns)
        .map_err(|err| EngineError::Protocol(format!("{label}: {err}")))?;
    IndexedFrame::new(index, frame)
}

/// Infers the narrowest column type that holds every non-null value.
fn values_to_series(name: &str, values: &[Value]) -> Series {
    let non_null = || values.iter().filter(|value| !value.is_null());

    if non_null().count() == 0 {
        let nulls: Vec<Option<f64>> = vec![None; values.len()];
        return Series::new(name.into(), nulls);
    }

    if non_null().all(Value::is_boolean) {
        let data: Vec<Option<bool>> = values.iter().map(Value::as_bool).collect();
        return Series::new(name.into(), data);
    }

    if non_null().all(Value::is_i64) {
        let data: Vec<Option<i64>> = values.iter().map(Value::as_i64).collect();
        return Series::new(name.into(), data);
    }

    if non_null().all(Value::is_number) {
        let data: Vec<Option<f64>> = values.iter().map(Value::as_f64).collect();
        return Series::new(name.into(), data);
    }

    let labels: Vec<Option<String>> = values
        .iter()
        .map(|value| (!value.is_null()).then(|| value_as_label(value)))
        .collect();
    let data: Vec<Option<&str>> = labels.iter().map(|label| label.as_deref()).collect();
    Series::new(name.into(), data)
}

fn value_as_i64(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|float| float.is_finite() && float.fract() == 0.0)
            .map(|float| float as i64)
    })
}

fn value_as_label(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
