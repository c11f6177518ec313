mod cli;
mod terminal;

use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::debug;

use cli::CliArgs;
use dunefetch_dune::{
    load_dotenv, render_bar_chart, render_line_chart, run_query, DuneClient, DuneConfig,
    Persister, QueryParameters, QueryResults, RunOutcome, Series,
};

/// Exit status for an execution that ended in a failed terminal state.
const EXIT_JOB_FAILED: u8 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    load_dotenv();

    let config = apply_overrides(
        DuneConfig::from_env().context("Failed to load Dune configuration")?,
        &args,
    )?;
    debug!(?config, "Configuration loaded");

    let client = DuneClient::from_config(&config).context("Failed to build HTTP client")?;
    let persister = Persister::new(config.output_dir.clone()).with_json_dump(args.save_json);
    let params = QueryParameters::new(args.symbol.clone(), args.period);

    terminal::info(&format!(
        "Running query {} for symbol={} period={}",
        config.query_id, params.symbol, params.period
    ))?;

    let report = run_query(
        &client,
        &config.query_id,
        &params,
        &config.poll_policy(),
        &persister,
    )
    .await
    .with_context(|| format!("Query {} did not produce results", config.query_id))?;

    if let Some(results) = &report.results {
        if args.show_table && !results.is_empty() {
            terminal::block("Query results", &results.to_string())?;
        }
        if args.charts {
            print_charts(results)?;
        }
    }

    match report.outcome {
        RunOutcome::Saved {
            parquet_path,
            json_path,
            rows,
        } => {
            terminal::success(&format!("Saved {rows} rows to {}", parquet_path.display()))?;
            if let Some(path) = json_path {
                terminal::success(&format!("Raw results saved to {}", path.display()))?;
            }
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::NoData => {
            terminal::warning(&format!(
                "No data returned for symbol={} period={}; nothing written",
                params.symbol, params.period
            ))?;
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::JobFailed { state, message } => {
            terminal::error(&format!(
                "Execution {} ended in state {}: {}",
                report.execution_id,
                state,
                message.as_deref().unwrap_or("no reason given")
            ))?;
            Ok(ExitCode::from(EXIT_JOB_FAILED))
        }
    }
}

/// Command-line flags take precedence over environment settings.
fn apply_overrides(mut config: DuneConfig, args: &CliArgs) -> Result<DuneConfig> {
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(secs) = args.poll_interval {
        config.poll_interval_secs = secs;
    }
    if let Some(factor) = args.backoff_factor {
        if !factor.is_finite() || factor < 1.0 {
            bail!("--backoff-factor must be a finite number >= 1.0, got {factor}");
        }
        config.poll_backoff_factor = factor;
    }
    if let Some(secs) = args.max_interval {
        config.poll_max_interval_secs = secs;
    }
    if let Some(attempts) = args.max_attempts {
        config.poll_max_attempts = Some(attempts);
    }
    if let Some(secs) = args.timeout {
        config.poll_timeout_secs = secs;
    }
    Ok(config)
}

fn print_block(chart: &str) -> Result<()> {
    let (header, body) = chart.split_once('\n').unwrap_or((chart, ""));
    terminal::block(header, body)
}

fn print_charts(results: &QueryResults) -> Result<()> {
    for (title, column) in [
        ("Volume by Period", "volume_usd"),
        ("Fees Collected by Period", "fees_usd"),
    ] {
        match Series::from_results(results, "period", column) {
            Some(series) => {
                print_block(&render_bar_chart(title, &series))?;
                print_block(&render_line_chart(&format!("{title} (trend)"), &series))?;
            }
            None => terminal::warning(&format!("{title}: column '{column}' not in results"))?,
        }
    }
    Ok(())
}
