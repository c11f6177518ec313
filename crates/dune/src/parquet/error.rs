use std::path::PathBuf;

/// Failures while turning a result set into a Parquet file.
#[derive(Debug, thiserror::Error)]
pub enum ParquetError {
    #[error("building Arrow columns failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("encoding Parquet output failed: {0}")]
    Encode(#[from] parquet::errors::ParquetError),

    #[error("cannot create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
