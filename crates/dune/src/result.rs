use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Aggregation period accepted by the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    pub const ALL: [Period; 4] = [Period::Day, Period::Week, Period::Month, Period::Year];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown period {s:?} (expected day, week, month or year)"))
    }
}

/// Parameters forwarded to the saved query as `query_parameters`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParameters {
    /// Token symbol, free text (e.g. "USDC", "ETH").
    pub symbol: String,
    pub period: Period,
}

impl QueryParameters {
    pub fn new(symbol: impl Into<String>, period: Period) -> Self {
        Self {
            symbol: symbol.into(),
            period,
        }
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Opaque identifier of one asynchronous query execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionHandle(String);

impl ExecutionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of an execution as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionState {
    Pending,
    Executing,
    Completed,
    Failed,
    Cancelled,
    Expired,
    CompletedPartial,
    /// Any state string this client does not know; treated as in progress.
    Other(String),
}

impl ExecutionState {
    /// Parse the `QUERY_STATE_*` string used on the wire.
    pub fn from_api(state: &str) -> Self {
        match state {
            "QUERY_STATE_PENDING" => Self::Pending,
            "QUERY_STATE_EXECUTING" => Self::Executing,
            "QUERY_STATE_COMPLETED" => Self::Completed,
            "QUERY_STATE_FAILED" => Self::Failed,
            "QUERY_STATE_CANCELLED" => Self::Cancelled,
            "QUERY_STATE_EXPIRED" => Self::Expired,
            "QUERY_STATE_COMPLETED_PARTIAL" => Self::CompletedPartial,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_api_str(&self) -> &str {
        match self {
            Self::Pending => "QUERY_STATE_PENDING",
            Self::Executing => "QUERY_STATE_EXECUTING",
            Self::Completed => "QUERY_STATE_COMPLETED",
            Self::Failed => "QUERY_STATE_FAILED",
            Self::Cancelled => "QUERY_STATE_CANCELLED",
            Self::Expired => "QUERY_STATE_EXPIRED",
            Self::CompletedPartial => "QUERY_STATE_COMPLETED_PARTIAL",
            Self::Other(s) => s,
        }
    }

    /// No further transition happens from a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Expired | Self::CompletedPartial
        )
    }

    /// Only a fully completed execution has results worth fetching.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

impl Serialize for ExecutionState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_api_str())
    }
}

impl<'de> Deserialize<'de> for ExecutionState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_api(&s))
    }
}

/// Error details attached to a failed execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response of the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    #[serde(default)]
    pub execution_id: Option<String>,
    pub state: ExecutionState,
    #[serde(default)]
    pub error: Option<ExecutionError>,
}

impl ExecutionStatus {
    pub fn new(state: ExecutionState) -> Self {
        Self {
            execution_id: None,
            state,
            error: None,
        }
    }

    /// Human-readable failure reason, if the service supplied one.
    pub fn failure_message(&self) -> Option<String> {
        let err = self.error.as_ref()?;
        match (&err.kind, &err.message) {
            (Some(kind), Some(msg)) => Some(format!("{kind}: {msg}")),
            (None, Some(msg)) => Some(msg.clone()),
            (Some(kind), None) => Some(kind.clone()),
            (None, None) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// One result row: column name to scalar value, in payload order.
pub type ResultRow = IndexMap<String, Value>;

/// Column metadata returned alongside the rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetadata {
    #[serde(default)]
    pub column_names: Vec<String>,
    #[serde(default)]
    pub column_types: Vec<String>,
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub total_row_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ResultsPayload {
    #[serde(default)]
    execution_id: Option<String>,
    #[serde(default)]
    result: Option<ResultSet>,
}

#[derive(Debug, Default, Deserialize)]
struct ResultSet {
    #[serde(default)]
    rows: Option<Vec<ResultRow>>,
    #[serde(default)]
    metadata: Option<ResultMetadata>,
}

/// Rows of a completed execution plus the raw payload they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResults {
    pub execution_id: Option<String>,
    pub rows: Vec<ResultRow>,
    pub metadata: Option<ResultMetadata>,
    /// The response body exactly as received.
    pub raw: Value,
}

impl QueryResults {
    /// Parse a results response body. A missing `result`, or `rows` that
    /// is absent or null, yields an empty row set.
    pub fn from_payload(raw: Value) -> Result<Self, serde_json::Error> {
        let payload: ResultsPayload = serde_json::from_value(raw.clone())?;
        let set = payload.result.unwrap_or_default();
        Ok(Self {
            execution_id: payload.execution_id,
            rows: set.rows.unwrap_or_default(),
            metadata: set.metadata,
            raw,
        })
    }

    /// Build results directly from rows (no metadata).
    pub fn from_rows(rows: Vec<ResultRow>) -> Self {
        let raw = serde_json::json!({ "result": { "rows": &rows } });
        Self {
            execution_id: None,
            rows,
            metadata: None,
            raw,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in a stable order: declared metadata names first, then
    /// any undeclared row keys in order of first appearance.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: IndexMap<&str, ()> = IndexMap::new();
        if let Some(meta) = &self.metadata {
            for name in &meta.column_names {
                names.entry(name.as_str()).or_insert(());
            }
        }
        for row in &self.rows {
            for key in row.keys() {
                names.entry(key.as_str()).or_insert(());
            }
        }
        names.into_keys().map(str::to_string).collect()
    }

    /// Declared SQL type of a column, if the metadata carries one.
    pub fn column_type(&self, name: &str) -> Option<&str> {
        let meta = self.metadata.as_ref()?;
        let idx = meta.column_names.iter().position(|c| c == name)?;
        meta.column_types.get(idx).map(String::as_str)
    }

    /// Value at the given row and column; `None` if out of range or null.
    pub fn get_value(&self, row: usize, col: &str) -> Option<&Value> {
        self.rows.get(row)?.get(col).filter(|v| !v.is_null())
    }
}

/// Render a cell for text output. Strings are shown without quotes.
pub(crate) fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "NULL".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

impl fmt::Display for QueryResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = self.column_names();
        if columns.is_empty() {
            return write!(f, "(empty result set)");
        }

        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| columns.iter().map(|c| cell_text(row.get(c))).collect())
            .collect();

        // Column widths (minimum = header length).
        let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        for (i, col) in columns.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{:<width$}", col, width = widths[i])?;
        }
        writeln!(f)?;

        for (i, w) in widths.iter().enumerate() {
            if i > 0 {
                write!(f, "-+-")?;
            }
            write!(f, "{}", "-".repeat(*w))?;
        }
        writeln!(f)?;

        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                if i > 0 {
                    write!(f, " | ")?;
                }
                write!(f, "{:<width$}", cell, width = widths[i])?;
            }
            writeln!(f)?;
        }

        writeln!(f)?;
        write!(
            f,
            "Execution {} | {} rows | {} columns",
            self.execution_id.as_deref().unwrap_or("-"),
            self.rows.len(),
            columns.len(),
        )
    }
}
