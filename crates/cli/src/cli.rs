use std::path::PathBuf;

use clap::Parser;
use dunefetch_dune::Period;

/// Execute a saved Dune Analytics query and save the rows as Parquet.
///
/// Credentials come from the environment (or a .env file):
/// DUNE_API_KEY and DUNE_QUERY_ID are required.
#[derive(Parser, Debug)]
#[command(name = "dunefetch", version, about)]
pub struct CliArgs {
    /// Token symbol to query, e.g. USDC, ETH, BTC, DAI, USDT
    #[arg(long)]
    pub symbol: String,

    /// Aggregation period: day, week, month or year
    #[arg(long, default_value = "month")]
    pub period: Period,

    /// Root directory for partitioned output (overrides DUNE_OUTPUT_DIR)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Also write the raw results payload as query_results.json
    #[arg(long)]
    pub save_json: bool,

    /// Print the result rows as a table
    #[arg(long)]
    pub show_table: bool,

    /// Print volume and fee charts keyed by period
    #[arg(long)]
    pub charts: bool,

    /// Seconds to wait after the first in-progress status
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Multiplier applied to the wait after each in-progress status
    #[arg(long)]
    pub backoff_factor: Option<f64>,

    /// Upper bound in seconds for a single wait
    #[arg(long)]
    pub max_interval: Option<u64>,

    /// Give up after this many status checks
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Give up after this many seconds of polling (0 = never)
    #[arg(long)]
    pub timeout: Option<u64>,
}
