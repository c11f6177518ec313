use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use tracing::debug;

use crate::result::QueryResults;
use super::builders::build_arrays;
use super::error::ParquetError;
use super::schema::build_schema;

/// Provenance recorded as key-value metadata in the Parquet footer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputMetadata {
    pub execution_id: Option<String>,
    pub query_id: Option<String>,
    pub symbol: Option<String>,
    pub period: Option<String>,
}

impl OutputMetadata {
    fn key_values(&self) -> Vec<KeyValue> {
        [
            ("dune.execution_id", &self.execution_id),
            ("dune.query_id", &self.query_id),
            ("dune.symbol", &self.symbol),
            ("dune.period", &self.period),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_ref()
                .map(|v| KeyValue::new(key.to_string(), Some(v.clone())))
        })
        .collect()
    }
}

/// Convert [`QueryResults`] into an Arrow [`RecordBatch`].
pub fn results_to_record_batch(results: &QueryResults) -> Result<RecordBatch, ParquetError> {
    let schema = Arc::new(build_schema(results));
    let arrays = build_arrays(&results.rows, &schema)?;
    // Explicit row count keeps zero-column batches valid.
    let options = RecordBatchOptions::new().with_row_count(Some(results.rows.len()));
    let batch = RecordBatch::try_new_with_options(schema, arrays, &options)?;
    Ok(batch)
}

/// Write [`QueryResults`] to a Parquet file at the given path.
///
/// Uses Zstd compression and stores `meta` as key-value metadata in the
/// file footer. Parent directories are created as needed. Returns the
/// number of rows written.
pub fn write_parquet(
    results: &QueryResults,
    meta: &OutputMetadata,
    path: &Path,
) -> Result<u64, ParquetError> {
    let batch = results_to_record_batch(results)?;
    let row_count = batch.num_rows() as u64;

    let create_err = |source: std::io::Error| ParquetError::Create {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(create_err)?;
    }
    let file = File::create(path).map_err(create_err)?;

    let key_values = meta.key_values();
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(Default::default()))
        .set_key_value_metadata((!key_values.is_empty()).then_some(key_values))
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    debug!(
        path = %path.display(),
        rows = row_count,
        columns = batch.num_columns(),
        "Wrote Parquet file"
    );

    Ok(row_count)
}
