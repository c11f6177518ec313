pub mod config;
pub mod client;
pub mod result;
pub mod poll;
pub mod parquet;
pub mod persist;
pub mod chart;
pub mod run;

pub use config::{load_dotenv, ConfigError, DuneConfig};
pub use client::{DuneClient, DuneError, ExecutionApi};
pub use result::{
    ExecutionError, ExecutionHandle, ExecutionState, ExecutionStatus, Period, QueryParameters,
    QueryResults, ResultMetadata, ResultRow,
};
pub use poll::{wait_for_completion, PollPolicy, PollReport};
pub use crate::parquet::{results_to_record_batch, write_parquet, OutputMetadata, ParquetError};
pub use persist::{partition_dir, PersistError, PersistOutcome, Persister};
pub use chart::{render_bar_chart, render_line_chart, Series};
pub use run::{run_query, RunOutcome, RunReport};
