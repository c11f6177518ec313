//! Build typed Arrow arrays from JSON result rows.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder,
    TimestampMillisecondBuilder,
};
use arrow::datatypes::{DataType, Schema, TimeUnit};
use serde_json::Value;

use crate::result::ResultRow;
use super::error::ParquetError;

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            // Whole floats like 100.0 are still integers.
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Build typed Arrow arrays, one per schema field, from the row maps.
///
/// A key missing from a row is NULL. Values that do not fit the field's
/// type also become NULL rather than failing the whole batch.
pub(crate) fn build_arrays(rows: &[ResultRow], schema: &Schema) -> Result<Vec<ArrayRef>, ParquetError> {
    let num_rows = rows.len();
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

    for field in schema.fields() {
        let name = field.name().as_str();
        let cells = rows
            .iter()
            .map(|row| row.get(name).filter(|v| !v.is_null()));

        let array: ArrayRef = match field.data_type() {
            DataType::Int64 => {
                let mut builder = Int64Builder::with_capacity(num_rows);
                for cell in cells {
                    builder.append_option(cell.and_then(as_i64));
                }
                Arc::new(builder.finish())
            }
            DataType::Float64 => {
                let mut builder = Float64Builder::with_capacity(num_rows);
                for cell in cells {
                    builder.append_option(cell.and_then(as_f64));
                }
                Arc::new(builder.finish())
            }
            DataType::Boolean => {
                let mut builder = BooleanBuilder::with_capacity(num_rows);
                for cell in cells {
                    builder.append_option(cell.and_then(as_bool));
                }
                Arc::new(builder.finish())
            }
            DataType::Timestamp(TimeUnit::Millisecond, _) => {
                let mut builder = TimestampMillisecondBuilder::with_capacity(num_rows);
                for cell in cells {
                    let ms = match cell {
                        Some(Value::String(s)) => parse_timestamp_ms(s),
                        Some(Value::Number(n)) => n.as_i64(),
                        _ => None,
                    };
                    builder.append_option(ms);
                }
                Arc::new(builder.finish().with_timezone("UTC"))
            }
            // Default: UTF-8 string
            _ => {
                let mut builder = StringBuilder::with_capacity(num_rows, num_rows * 32);
                for cell in cells {
                    match cell {
                        Some(Value::String(s)) => builder.append_value(s),
                        Some(other) => builder.append_value(other.to_string()),
                        None => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
        };

        arrays.push(array);
    }

    Ok(arrays)
}

/// Parse a timestamp string into epoch milliseconds.
///
/// Supports:
/// 1. RFC 3339: `2024-06-14T10:30:00Z`
/// 2. DuneSQL output: `2024-06-14 10:30:00.000 UTC`
/// 3. Space-separated, optional fraction: `2024-06-14 10:30:00[.123]`
/// 4. Date only: `2024-06-14` (midnight UTC)
pub(crate) fn parse_timestamp_ms(value: &str) -> Option<i64> {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc).timestamp_millis());
    }
    let naive = value.strip_suffix(" UTC").unwrap_or(value);
    if let Ok(ndt) = NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S") {
        return Some(ndt.and_utc().timestamp_millis());
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ndt.and_utc().timestamp_millis());
    }
    if let Ok(nd) = NaiveDate::parse_from_str(naive, "%Y-%m-%d") {
        return Some(nd.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis());
    }
    None
}
