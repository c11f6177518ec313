use std::path::PathBuf;

use tracing::{error, info};

use crate::client::{DuneError, ExecutionApi};
use crate::persist::{validate_partition_value, PersistOutcome, Persister};
use crate::poll::{wait_for_completion, PollPolicy};
use crate::result::{ExecutionHandle, ExecutionState, QueryParameters, QueryResults};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How a run ended, when it did not end in an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Rows were fetched and written.
    Saved {
        parquet_path: PathBuf,
        json_path: Option<PathBuf>,
        rows: u64,
    },
    /// The execution completed without rows; nothing was written.
    NoData,
    /// The execution reached a terminal state other than completed.
    JobFailed {
        state: ExecutionState,
        message: Option<String>,
    },
}

/// Everything a caller may want to show after a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub execution_id: ExecutionHandle,
    pub outcome: RunOutcome,
    /// Fetched results; `None` when the execution did not complete.
    pub results: Option<QueryResults>,
    /// Number of status calls made.
    pub status_checks: u32,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Submit `query_id`, wait for a terminal state and persist the rows.
///
/// Results are fetched only after a completed status has been observed.
/// A failed execution is reported through [`RunOutcome::JobFailed`], not as
/// an error; transport, decoding, timeout and write failures are errors.
pub async fn run_query<A>(
    api: &A,
    query_id: &str,
    params: &QueryParameters,
    policy: &PollPolicy,
    persister: &Persister,
) -> Result<RunReport, DuneError>
where
    A: ExecutionApi + ?Sized,
{
    validate_partition_value("symbol", &params.symbol).map_err(DuneError::InvalidParameter)?;

    info!("Executing query...");
    let handle = api.execute(query_id, params).await?;
    info!(execution_id = %handle, "Query is running");

    let poll = wait_for_completion(api, &handle, policy).await?;

    if !poll.status.state.is_success() {
        let message = poll.status.failure_message();
        error!(
            execution_id = %handle,
            state = %poll.status.state,
            reason = message.as_deref().unwrap_or("unknown"),
            "Query failed"
        );
        return Ok(RunReport {
            execution_id: handle,
            outcome: RunOutcome::JobFailed {
                state: poll.status.state,
                message,
            },
            results: None,
            status_checks: poll.attempts,
        });
    }

    info!(
        execution_id = %handle,
        status_checks = poll.attempts,
        elapsed_secs = poll.elapsed.as_secs(),
        "Query completed successfully"
    );

    let mut results = api.results(&handle).await?;
    if results.execution_id.is_none() {
        results.execution_id = Some(handle.to_string());
    }

    let outcome = match persister.persist(params, &results, Some(query_id))? {
        PersistOutcome::NoData => RunOutcome::NoData,
        PersistOutcome::Written {
            parquet_path,
            json_path,
            rows,
        } => RunOutcome::Saved {
            parquet_path,
            json_path,
            rows,
        },
    };

    Ok(RunReport {
        execution_id: handle,
        outcome,
        results: Some(results),
        status_checks: poll.attempts,
    })
}
