//! Dune Analytics query execution client.
//!
//! Provides the [`ExecutionApi`] trait covering the three calls a run needs
//! (execute, status, results) and [`DuneClient`], its HTTP implementation.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::DuneConfig;
use crate::persist::PersistError;
use crate::result::{ExecutionHandle, ExecutionStatus, QueryParameters, QueryResults};

/// Header carrying the API credential.
pub const API_KEY_HEADER: &str = "X-DUNE-API-KEY";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum DuneError {
    /// A query parameter cannot be used (e.g. unsafe as a path segment).
    #[error("invalid query parameter: {0}")]
    InvalidParameter(String),

    /// The HTTP request itself failed (connect, timeout, TLS, ...).
    #[error("{op} request failed: {source}")]
    Request {
        op: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status code.
    #[error("{op} returned HTTP {status}: {body}")]
    Status {
        op: &'static str,
        status: StatusCode,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("{op} response could not be decoded: {source}")]
    Decode {
        op: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Polling gave up before the execution reached a terminal state.
    #[error("execution {execution_id} still running after {attempts} status checks ({}s)", .elapsed.as_secs())]
    PollTimeout {
        execution_id: String,
        attempts: u32,
        elapsed: Duration,
    },

    /// Writing the output files failed.
    #[error(transparent)]
    Persist(#[from] PersistError),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// The remote job API: submit, check status, fetch rows.
#[async_trait::async_trait]
pub trait ExecutionApi: Send + Sync {
    /// Start an execution of `query_id` with the given parameters.
    async fn execute(
        &self,
        query_id: &str,
        params: &QueryParameters,
    ) -> Result<ExecutionHandle, DuneError>;

    /// Current status of an execution.
    async fn status(&self, handle: &ExecutionHandle) -> Result<ExecutionStatus, DuneError>;

    /// Result rows of a completed execution.
    async fn results(&self, handle: &ExecutionHandle) -> Result<QueryResults, DuneError>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    query_parameters: &'a QueryParameters,
}

#[derive(Deserialize)]
struct ExecuteResponse {
    execution_id: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the Dune REST API.
pub struct DuneClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl DuneClient {
    /// Create a client against `base_url` (e.g. `https://api.dune.com/api/v1`).
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, DuneError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|source| DuneError::Request {
                op: "client setup",
                source,
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http,
        })
    }

    pub fn from_config(config: &DuneConfig) -> Result<Self, DuneError> {
        Self::new(&config.base_url, config.api_key.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and decode the JSON body, mapping every failure
    /// to a [`DuneError`] tagged with `op`.
    async fn send_json(
        &self,
        op: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, DuneError> {
        let resp = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|source| DuneError::Request { op, source })?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|source| DuneError::Request { op, source })?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            return Err(DuneError::Status { op, status, body });
        }

        serde_json::from_slice(&bytes).map_err(|source| DuneError::Decode { op, source })
    }
}

#[async_trait::async_trait]
impl ExecutionApi for DuneClient {
    async fn execute(
        &self,
        query_id: &str,
        params: &QueryParameters,
    ) -> Result<ExecutionHandle, DuneError> {
        let url = format!("{}/query/{}/execute", self.base_url, query_id);
        info!(
            query_id = %query_id,
            symbol = %params.symbol,
            period = %params.period,
            "Submitting query execution"
        );

        let body = self
            .send_json(
                "execute",
                self.http.post(&url).json(&ExecuteRequest {
                    query_parameters: params,
                }),
            )
            .await?;
        let resp: ExecuteResponse = serde_json::from_value(body)
            .map_err(|source| DuneError::Decode { op: "execute", source })?;

        info!(execution_id = %resp.execution_id, "Query execution started");
        Ok(ExecutionHandle::new(resp.execution_id))
    }

    async fn status(&self, handle: &ExecutionHandle) -> Result<ExecutionStatus, DuneError> {
        let url = format!("{}/execution/{}/status", self.base_url, handle);
        let body = self.send_json("status", self.http.get(&url)).await?;
        serde_json::from_value(body).map_err(|source| DuneError::Decode { op: "status", source })
    }

    async fn results(&self, handle: &ExecutionHandle) -> Result<QueryResults, DuneError> {
        let url = format!("{}/execution/{}/results", self.base_url, handle);
        let body = self.send_json("results", self.http.get(&url)).await?;
        let results = QueryResults::from_payload(body)
            .map_err(|source| DuneError::Decode { op: "results", source })?;

        debug!(
            execution_id = %handle,
            rows = results.row_count(),
            "Fetched execution results"
        );
        Ok(results)
    }
}
