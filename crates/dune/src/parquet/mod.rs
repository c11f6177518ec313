//! Convert [`QueryResults`](crate::result::QueryResults) to Apache Parquet files.
//!
//! Column types come from the declared SQL types when the service sends
//! them, otherwise they are inferred from the JSON values. Output is a typed,
//! ZSTD-compressed Parquet file readable by DuckDB, Polars or Spark.

mod error;
pub(crate) mod schema;
pub(crate) mod builders;
mod writer;


pub use error::ParquetError;
pub use writer::{results_to_record_batch, write_parquet, OutputMetadata};
