use polars::prelude::*;
use serde_json::{Map, Number, Value};

use crate::error::Result;
use crate::shaping::Sentinel;

/// One table row keyed by column name, in column order.
pub type Record = Map<String, Value>;

/// Converts a scalar cell to JSON. Returns `None` for nulls and for floats
/// that JSON cannot represent (NaN, ±inf).
pub fn any_value_to_json(value: &AnyValue<'_>) -> Option<Value> {
    let json = match value {
        AnyValue::Null => return None,
        AnyValue::Boolean(flag) => Value::Bool(*flag),
        AnyValue::String(text) => Value::String((*text).to_string()),
        AnyValue::StringOwned(text) => Value::String(text.to_string()),
        AnyValue::Int8(int) => Value::from(*int),
        AnyValue::Int16(int) => Value::from(*int),
        AnyValue::Int32(int) => Value::from(*int),
        AnyValue::Int64(int) => Value::from(*int),
        AnyValue::UInt8(int) => Value::from(*int),
        AnyValue::UInt16(int) => Value::from(*int),
        AnyValue::UInt32(int) => Value::from(*int),
        AnyValue::UInt64(int) => Value::from(*int),
        AnyValue::Float32(float) => Value::Number(Number::from_f64(f64::from(*float))?),
        AnyValue::Float64(float) => Value::Number(Number::from_f64(*float)?),
        other => Value::String(other.to_string()),
    };
    Some(json)
}

/// Serializes a frame row by row. Cells with no JSON value become the sentinel.
pub fn frame_to_records(df: &DataFrame, sentinel: Sentinel) -> Result<Vec<Record>> {
    let columns = df.get_columns();
    let mut records = Vec::with_capacity(df.height());

    for idx in 0..df.height() {
        let mut record = Map::with_capacity(columns.len());
        for column in columns {
            let value = column.get(idx)?;
            let json = any_value_to_json(&value).unwrap_or_else(|| sentinel.to_json());
            record.insert(column.name().to_string(), json);
        }
        records.push(record);
    }

    Ok(records)
}
