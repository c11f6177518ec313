//! Partitioned on-disk output for completed executions.
//!
//! Layout: `<output_root>/symbol=<symbol>/period=<period>/data.parquet`,
//! with an optional `query_results.json` next to it. Files are written to a
//! temporary sibling first and renamed into place, so an interrupted write
//! never leaves a truncated artifact behind.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::parquet::{write_parquet, OutputMetadata, ParquetError};
use crate::result::{QueryParameters, QueryResults};

/// File name of the columnar artifact inside a partition.
pub const PARQUET_FILE_NAME: &str = "data.parquet";

/// File name of the raw JSON dump inside a partition.
pub const JSON_FILE_NAME: &str = "query_results.json";

/// Errors that can occur while writing output files.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error(transparent)]
    Parquet(#[from] ParquetError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What a persist call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The result set was empty; nothing was written.
    NoData,
    Written {
        parquet_path: PathBuf,
        json_path: Option<PathBuf>,
        rows: u64,
    },
}

/// Reject values that cannot be used as a single `key=value` path segment.
pub fn validate_partition_value(name: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{name} must not be empty"));
    }
    if value.contains(['/', '\\']) || value.contains("..") {
        return Err(format!("{name} {value:?} must not contain path separators or '..'"));
    }
    Ok(())
}

/// Partition directory for one (symbol, period) pair.
pub fn partition_dir(output_root: &Path, params: &QueryParameters) -> PathBuf {
    output_root
        .join(format!("symbol={}", params.symbol))
        .join(format!("period={}", params.period))
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PersistError + '_ {
    move |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes result sets into the partitioned output tree.
#[derive(Debug, Clone)]
pub struct Persister {
    output_root: PathBuf,
    write_json: bool,
}

impl Persister {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            write_json: false,
        }
    }

    /// Also dump the raw results payload as pretty-printed JSON.
    pub fn with_json_dump(mut self, enabled: bool) -> Self {
        self.write_json = enabled;
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Path of the Parquet artifact for `params`.
    pub fn parquet_path(&self, params: &QueryParameters) -> PathBuf {
        partition_dir(&self.output_root, params).join(PARQUET_FILE_NAME)
    }

    /// Path of the JSON dump for `params`.
    pub fn json_path(&self, params: &QueryParameters) -> PathBuf {
        partition_dir(&self.output_root, params).join(JSON_FILE_NAME)
    }

    /// Write `results` for `params`, overwriting any previous artifact.
    ///
    /// An empty result set writes nothing and returns [`PersistOutcome::NoData`].
    pub fn persist(
        &self,
        params: &QueryParameters,
        results: &QueryResults,
        query_id: Option<&str>,
    ) -> Result<PersistOutcome, PersistError> {
        if results.is_empty() {
            warn!(
                symbol = %params.symbol,
                period = %params.period,
                "No data returned from the query"
            );
            return Ok(PersistOutcome::NoData);
        }

        let dir = partition_dir(&self.output_root, params);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let meta = OutputMetadata {
            execution_id: results.execution_id.clone(),
            query_id: query_id.map(str::to_string),
            symbol: Some(params.symbol.clone()),
            period: Some(params.period.to_string()),
        };

        let parquet_path = self.parquet_path(params);
        let json_path = self.write_json.then(|| self.json_path(params));

        // Stage every artifact before any of them replaces a previous run's.
        let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(2);
        let staging = self.stage(
            results,
            &meta,
            &parquet_path,
            json_path.as_deref(),
            &mut staged,
        );
        let rows = match staging {
            Ok(rows) => rows,
            Err(e) => {
                for (tmp, _) in &staged {
                    let _ = fs::remove_file(tmp);
                }
                return Err(e);
            }
        };
        for (tmp, dest) in &staged {
            fs::rename(tmp, dest).map_err(io_err(dest))?;
        }

        info!(
            path = %parquet_path.display(),
            rows,
            json = json_path.is_some(),
            "File saved"
        );

        Ok(PersistOutcome::Written {
            parquet_path,
            json_path,
            rows,
        })
    }

    /// Write temporary siblings of `parquet_path` and `json_path`, recording
    /// each one in `staged` as soon as it exists on disk.
    fn stage<'p>(
        &self,
        results: &QueryResults,
        meta: &OutputMetadata,
        parquet_path: &'p Path,
        json_path: Option<&'p Path>,
        staged: &mut Vec<(PathBuf, &'p Path)>,
    ) -> Result<u64, PersistError> {
        let tmp = tmp_sibling(parquet_path);
        staged.push((tmp.clone(), parquet_path));
        let rows = write_parquet(results, meta, &tmp)?;

        if let Some(path) = json_path {
            let body = serde_json::to_vec_pretty(&results.raw)?;
            let tmp = tmp_sibling(path);
            staged.push((tmp.clone(), path));
            fs::write(&tmp, body).map_err(io_err(&tmp))?;
        }
        Ok(rows)
    }
}
