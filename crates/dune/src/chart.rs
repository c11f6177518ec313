//! Plain-text charts for a keyed numeric column.

use indexmap::IndexMap;
use serde_json::Value;

use crate::result::{cell_text, QueryResults};

const BAR_WIDTH: usize = 40;
const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Values of one column keyed by another, in first-seen key order.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub key_column: String,
    pub value_column: String,
    pub points: Vec<(String, f64)>,
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl Series {
    /// Build a series from `results`, summing values that share a key.
    ///
    /// Returns `None` when either column is absent from the result set.
    /// Rows with a non-numeric value are skipped.
    pub fn from_results(results: &QueryResults, key_column: &str, value_column: &str) -> Option<Self> {
        let columns = results.column_names();
        if !columns.iter().any(|c| c == key_column) || !columns.iter().any(|c| c == value_column) {
            return None;
        }

        let mut sums: IndexMap<String, f64> = IndexMap::new();
        for row in &results.rows {
            let Some(value) = row.get(value_column).and_then(numeric) else {
                continue;
            };
            let key = cell_text(row.get(key_column));
            *sums.entry(key).or_insert(0.0) += value;
        }

        Some(Self {
            key_column: key_column.to_string(),
            value_column: value_column.to_string(),
            points: sums.into_iter().collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn max(&self) -> f64 {
        self.points.iter().map(|(_, v)| *v).fold(f64::MIN, f64::max)
    }

    fn min(&self) -> f64 {
        self.points.iter().map(|(_, v)| *v).fold(f64::MAX, f64::min)
    }
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v:.2}")
    }
}

/// Horizontal bar chart, one line per key. Negative values draw no bar.
pub fn render_bar_chart(title: &str, series: &Series) -> String {
    let mut out = format!("{title}\n");
    if series.is_empty() {
        out.push_str("(no data)\n");
        return out;
    }

    let label_width = series.points.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    let max = series.max();

    for (key, value) in &series.points {
        let len = if max > 0.0 && *value > 0.0 {
            ((value / max) * BAR_WIDTH as f64).round().max(1.0) as usize
        } else {
            0
        };
        out.push_str(&format!(
            "{key:<label_width$} | {} {}\n",
            "█".repeat(len),
            format_value(*value)
        ));
    }
    out
}

/// Sparkline of the series in key order, followed by a min/max legend.
pub fn render_line_chart(title: &str, series: &Series) -> String {
    let mut out = format!("{title}\n");
    if series.is_empty() {
        out.push_str("(no data)\n");
        return out;
    }

    let (min, max) = (series.min(), series.max());
    let span = max - min;
    let top = SPARK_LEVELS.len() - 1;
    let line: String = series
        .points
        .iter()
        .map(|(_, v)| {
            let level = if span > 0.0 {
                (((v - min) / span) * top as f64).round() as usize
            } else {
                top / 2
            };
            SPARK_LEVELS[level.min(top)]
        })
        .collect();

    let first = &series.points[0].0;
    let last = &series.points[series.points.len() - 1].0;
    out.push_str(&line);
    out.push('\n');
    out.push_str(&format!(
        "{first} .. {last}  (min {}, max {})\n",
        format_value(min),
        format_value(max)
    ));
    out
}
