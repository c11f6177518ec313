//! End-to-end run tests over the scripted API.

use std::time::Duration;

use arrow::array::{Array, Int64Array, StringArray};
use dunefetch_dune::{
    run_query, DuneError, ExecutionState, Period, Persister, PollPolicy, QueryParameters,
    RunOutcome,
};
use serde_json::{json, Value};

use crate::support::{Call, ScriptedApi};

fn one_row_payload() -> Value {
    json!({
        "execution_id": "01HTESTEXECUTION",
        "result": {"rows": [{"period": "2024-01", "volume_usd": 100, "fees_usd": 1}]}
    })
}

fn policy() -> PollPolicy {
    PollPolicy::fixed(Duration::from_secs(10))
}

#[tokio::test(start_paused = true)]
async fn test_three_status_calls_then_one_results_call() {
    let api = ScriptedApi::new(
        vec![
            ExecutionState::Executing,
            ExecutionState::Executing,
            ExecutionState::Completed,
        ],
        one_row_payload(),
    );
    let dir = tempfile::tempdir().unwrap();
    let params = QueryParameters::new("USDT", Period::Month);

    let report = run_query(&api, "4242", &params, &policy(), &Persister::new(dir.path()))
        .await
        .unwrap();

    let calls = api.calls();
    assert_eq!(calls.len(), 5);
    assert_eq!(
        calls[0],
        Call::Execute {
            query_id: "4242".into(),
            params: params.clone(),
        }
    );
    assert!(calls[1..4].iter().all(|c| matches!(c, Call::Status(_))));
    assert_eq!(calls[4], Call::Results("01HTESTEXECUTION".into()));
    assert_eq!(report.status_checks, 3);
    assert_eq!(report.execution_id.as_str(), "01HTESTEXECUTION");
}

#[tokio::test(start_paused = true)]
async fn test_output_lands_at_partitioned_path() {
    let api = ScriptedApi::new(vec![ExecutionState::Completed], one_row_payload());
    let dir = tempfile::tempdir().unwrap();

    for period in Period::ALL {
        let params = QueryParameters::new("ETH", period);
        let report = run_query(&api, "4242", &params, &policy(), &Persister::new(dir.path()))
            .await
            .unwrap();

        let expected = dir
            .path()
            .join("symbol=ETH")
            .join(format!("period={period}"))
            .join("data.parquet");
        assert_eq!(
            report.outcome,
            RunOutcome::Saved {
                parquet_path: expected.clone(),
                json_path: None,
                rows: 1,
            }
        );
        assert!(expected.exists());
        let files = std::fs::read_dir(expected.parent().unwrap()).unwrap().count();
        assert_eq!(files, 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_persisted_row_keeps_names_and_values() {
    let api = ScriptedApi::new(vec![ExecutionState::Completed], one_row_payload());
    let dir = tempfile::tempdir().unwrap();
    let params = QueryParameters::new("USDC", Period::Month);

    let report = run_query(&api, "4242", &params, &policy(), &Persister::new(dir.path()))
        .await
        .unwrap();
    let RunOutcome::Saved { parquet_path, .. } = report.outcome else {
        panic!("expected Saved, got: {:?}", report.outcome);
    };

    let file = std::fs::File::open(parquet_path).unwrap();
    let reader =
        parquet::arrow::arrow_reader::ParquetRecordBatchReader::try_new(file, 1024).unwrap();
    let batches: Vec<_> = reader.map(|b| b.unwrap()).collect();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.num_rows(), 1);

    let schema = batch.schema();
    let col = |name: &str| batch.column(schema.index_of(name).unwrap()).clone();
    let period = col("period");
    let period = period.as_any().downcast_ref::<StringArray>().unwrap();
    let volume = col("volume_usd");
    let volume = volume.as_any().downcast_ref::<Int64Array>().unwrap();
    let fees = col("fees_usd");
    let fees = fees.as_any().downcast_ref::<Int64Array>().unwrap();

    assert_eq!(period.value(0), "2024-01");
    assert_eq!(volume.value(0), 100);
    assert_eq!(fees.value(0), 1);
    assert_eq!(batch.num_columns(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_never_fetches_results() {
    let api = ScriptedApi::new(
        vec![ExecutionState::Executing, ExecutionState::Failed],
        one_row_payload(),
    );
    let dir = tempfile::tempdir().unwrap();
    let params = QueryParameters::new("BTC", Period::Day);

    let report = run_query(&api, "4242", &params, &policy(), &Persister::new(dir.path()))
        .await
        .unwrap();

    assert!(matches!(
        report.outcome,
        RunOutcome::JobFailed {
            state: ExecutionState::Failed,
            ..
        }
    ));
    assert!(report.results.is_none());
    assert_eq!(api.results_calls(), 0);
    assert!(!dir.path().join("symbol=BTC").exists());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_job_is_reported_as_failure() {
    let api = ScriptedApi::new(vec![ExecutionState::Cancelled], one_row_payload());
    let dir = tempfile::tempdir().unwrap();

    let report = run_query(
        &api,
        "4242",
        &QueryParameters::new("BTC", Period::Day),
        &policy(),
        &Persister::new(dir.path()),
    )
    .await
    .unwrap();

    assert!(matches!(
        report.outcome,
        RunOutcome::JobFailed {
            state: ExecutionState::Cancelled,
            ..
        }
    ));
    assert_eq!(api.results_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_rows_signal_no_data() {
    let api = ScriptedApi::new(
        vec![ExecutionState::Completed],
        json!({"execution_id": "01HTESTEXECUTION", "result": {"rows": []}}),
    );
    let dir = tempfile::tempdir().unwrap();
    let persister = Persister::new(dir.path()).with_json_dump(true);

    let report = run_query(
        &api,
        "4242",
        &QueryParameters::new("DAI", Period::Week),
        &policy(),
        &persister,
    )
    .await
    .unwrap();

    assert_eq!(report.outcome, RunOutcome::NoData);
    assert_eq!(api.results_calls(), 1);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_symbol_fails_before_submit() {
    let api = ScriptedApi::new(vec![ExecutionState::Completed], one_row_payload());
    let dir = tempfile::tempdir().unwrap();

    for symbol in ["", "../etc", "a/b"] {
        let err = run_query(
            &api,
            "4242",
            &QueryParameters::new(symbol, Period::Day),
            &policy(),
            &Persister::new(dir.path()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DuneError::InvalidParameter(_)), "{symbol:?}");
    }
    assert!(api.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_poll_timeout_aborts_without_output() {
    let api = ScriptedApi::new(vec![ExecutionState::Executing], one_row_payload());
    let dir = tempfile::tempdir().unwrap();
    let policy = PollPolicy {
        max_attempts: Some(2),
        ..policy()
    };

    let err = run_query(
        &api,
        "4242",
        &QueryParameters::new("ETH", Period::Month),
        &policy,
        &Persister::new(dir.path()),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DuneError::PollTimeout { attempts: 2, .. }));
    assert_eq!(api.results_calls(), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
