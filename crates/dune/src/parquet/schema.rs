//! SQL type / JSON value to Arrow type mapping and schema construction.

use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use serde_json::Value;

use crate::result::QueryResults;

fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into()))
}

/// Map a declared column type (Trino/DuneSQL naming) to an Arrow DataType.
///
/// Parameterised types such as `decimal(38,0)` or `timestamp(3) with time zone`
/// are matched by prefix.
pub(crate) fn sql_type_to_arrow(sql_type: &str) -> DataType {
    let lower = sql_type.trim().to_lowercase();
    match lower.as_str() {
        "tinyint" | "smallint" | "int" | "integer" | "bigint" => DataType::Int64,
        "real" | "float" | "double" => DataType::Float64,
        "boolean" => DataType::Boolean,
        // 256-bit integers overflow every Arrow primitive; keep the digits.
        "int256" | "uint256" => DataType::Utf8,
        s if s.starts_with("decimal") => DataType::Float64,
        s if s.starts_with("timestamp") => timestamp_type(),
        _ => DataType::Utf8,
    }
}

/// Infer an Arrow type from the non-null values of one column.
///
/// All integers → Int64, all numbers → Float64, all booleans → Boolean,
/// anything else (or no values at all) → Utf8. A column holding an integer
/// beyond the `i64` range is Utf8 so its digits survive exactly.
pub(crate) fn infer_arrow_type<'a>(values: impl IntoIterator<Item = &'a Value>) -> DataType {
    let mut inferred: Option<DataType> = None;

    for value in values {
        let current = match value {
            Value::Null => continue,
            Value::Bool(_) => DataType::Boolean,
            v if overflows_i64(v) => return DataType::Utf8,
            Value::Number(n) if n.is_i64() => DataType::Int64,
            Value::Number(_) => DataType::Float64,
            _ => return DataType::Utf8,
        };

        inferred = Some(match (inferred, current) {
            (None, t) => t,
            (Some(a), b) if a == b => a,
            (Some(DataType::Int64), DataType::Float64)
            | (Some(DataType::Float64), DataType::Int64) => DataType::Float64,
            _ => return DataType::Utf8,
        });
    }

    inferred.unwrap_or(DataType::Utf8)
}

/// True for an integer, or a string of digits, that does not fit in `i64`.
pub(crate) fn overflows_i64(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_u64() && !n.is_i64(),
        Value::String(s) => {
            let s = s.trim();
            let digits = s.strip_prefix('-').unwrap_or(s);
            !digits.is_empty()
                && digits.bytes().all(|b| b.is_ascii_digit())
                && s.parse::<i64>().is_err()
        }
        _ => false,
    }
}

/// Build an Arrow [`Schema`] for the result rows. Every field is nullable.
///
/// A declared integer column whose values exceed `i64` is stored as Utf8.
pub(crate) fn build_schema(results: &QueryResults) -> Schema {
    let fields: Vec<Field> = results
        .column_names()
        .iter()
        .map(|name| {
            let values = || results.rows.iter().filter_map(|row| row.get(name));
            let data_type = match results.column_type(name).map(sql_type_to_arrow) {
                Some(DataType::Int64) if values().any(overflows_i64) => DataType::Utf8,
                Some(declared) => declared,
                None => infer_arrow_type(values()),
            };
            Field::new(name, data_type, true)
        })
        .collect();
    Schema::new(fields)
}
