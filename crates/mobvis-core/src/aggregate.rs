use polars::prelude::*;

/// Columns of the per-bout table that identify or locate a bout rather than
/// describe it.
const NON_PARAMETER_COLUMNS: [&str; 3] = ["wb_id", "start", "end"];

/// Summarises every numeric per-bout parameter as `param, max, min, avg, var`.
/// `var` is the sample variance; statistics that are undefined for the data
/// (no values, or a single value for `var`) come back as NaN. A table with
/// rows but no numeric parameter columns yields an empty summary.
pub fn calculate_aggregate_parameters(per_wb: &DataFrame) -> PolarsResult<DataFrame> {
    let mut params: Vec<String> = Vec::new();
    let mut max = Vec::new();
    let mut min = Vec::new();
    let mut avg = Vec::new();
    let mut var = Vec::new();

    for column in per_wb.get_columns() {
        let name = column.name().as_str();
        if NON_PARAMETER_COLUMNS.contains(&name) || !is_numeric(column.dtype()) {
            continue;
        }

        let values = column.cast(&DataType::Float64)?;
        let values: Vec<f64> = values.f64()?.into_iter().flatten().collect();
        let summary = Summary::of(&values);

        params.push(name.to_string());
        max.push(summary.max);
        min.push(summary.min);
        avg.push(summary.avg);
        var.push(summary.var);
    }

    let params: Vec<&str> = params.iter().map(String::as_str).collect();
    DataFrame::new(vec![
        Series::new("param".into(), params).into(),
        Series::new("max".into(), max).into(),
        Series::new("min".into(), min).into(),
        Series::new("avg".into(), avg).into(),
        Series::new("var".into(), var).into(),
    ])
}

pub(crate) fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

struct Summary {
    max: f64,
    min: f64,
    avg: f64,
    var: f64,
}

impl Summary {
    fn of(values: &[f64]) -> Self {
        let values: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if values.is_empty() {
            return Self {
                max: f64::NAN,
                min: f64::NAN,
                avg: f64::NAN,
                var: f64::NAN,
            };
        }

        let n = values.len() as f64;
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let avg = values.iter().sum::<f64>() / n;
        let var = if values.len() < 2 {
            f64::NAN
        } else {
            values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (n - 1.0)
        };

        Self { max, min, avg, var }
    }
}
