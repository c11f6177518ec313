use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::poll::PollPolicy;

/// Default base URL of the Dune Analytics REST API.
pub const DEFAULT_API_URL: &str = "https://api.dune.com/api/v1";

/// Default root directory for partitioned output files.
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_POLL_BACKOFF_FACTOR: f64 = 1.5;
const DEFAULT_POLL_MAX_INTERVAL_SECS: u64 = 60;
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 1800;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Errors raised while building [`DuneConfig`] from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("required environment variable {0} is not set")]
    MissingVar(String),

    /// A variable is set but cannot be parsed.
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

// ── Env helpers ──────────────────────────────────────────────────

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries `{PROFILE}_{KEY}` first, falls back to `{KEY}`.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_required(profile: &str, key: &str) -> Result<String, ConfigError> {
    profiled_env_opt(profile, key).ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: FromStr>(profile: &str, key: &str) -> Result<Option<T>, ConfigError> {
    match profiled_env_opt(profile, key) {
        Some(v) => v.trim().parse().map(Some).map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: v,
        }),
        None => Ok(None),
    }
}

// ── DuneConfig ───────────────────────────────────────────────────

/// Immutable run configuration, built once at process entry.
///
/// Reads from environment variables with optional profile prefix.
/// When `DUNEFETCH_PROFILE=PROD`, checks `PROD_DUNE_API_KEY` before `DUNE_API_KEY`.
#[derive(Clone)]
pub struct DuneConfig {
    /// API credential sent as `X-DUNE-API-KEY`.
    pub api_key: String,
    /// Saved query to execute.
    pub query_id: String,
    /// Base URL of the REST API, without trailing slash.
    pub base_url: String,
    /// Root directory for partitioned output.
    pub output_dir: PathBuf,
    /// First wait between status polls, in seconds.
    pub poll_interval_secs: u64,
    /// Multiplier applied to the wait after each in-progress poll.
    pub poll_backoff_factor: f64,
    /// Upper bound for the wait between polls, in seconds.
    pub poll_max_interval_secs: u64,
    /// Optional cap on the number of status calls.
    pub poll_max_attempts: Option<u32>,
    /// Overall polling deadline in seconds (0 = unbounded).
    pub poll_timeout_secs: u64,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
}

impl DuneConfig {
    /// Build config from environment variables (call [`load_dotenv`] first).
    ///
    /// Profile is read from `DUNEFETCH_PROFILE`. Fails with
    /// [`ConfigError::MissingVar`] when `DUNE_API_KEY` or `DUNE_QUERY_ID`
    /// is absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        let profile = env_opt("DUNEFETCH_PROFILE")
            .map(|s| s.to_uppercase())
            .unwrap_or_default();
        Self::from_env_profiled(&profile)
    }

    /// Build config for a specific named profile.
    pub fn from_env_profiled(profile: &str) -> Result<Self, ConfigError> {
        let api_key = profiled_env_required(profile, "DUNE_API_KEY")?;
        let query_id = profiled_env_required(profile, "DUNE_QUERY_ID")?;

        let poll_backoff_factor: f64 = profiled_env_parse(profile, "DUNE_POLL_BACKOFF_FACTOR")?
            .unwrap_or(DEFAULT_POLL_BACKOFF_FACTOR);
        if !poll_backoff_factor.is_finite() || poll_backoff_factor < 1.0 {
            return Err(ConfigError::Invalid {
                key: "DUNE_POLL_BACKOFF_FACTOR".into(),
                value: poll_backoff_factor.to_string(),
            });
        }

        Ok(Self {
            api_key,
            query_id,
            base_url: profiled_env_or(profile, "DUNE_API_URL", DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
            output_dir: PathBuf::from(profiled_env_or(
                profile,
                "DUNE_OUTPUT_DIR",
                DEFAULT_OUTPUT_DIR,
            )),
            poll_interval_secs: profiled_env_parse(profile, "DUNE_POLL_INTERVAL_SECS")?
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            poll_backoff_factor,
            poll_max_interval_secs: profiled_env_parse(profile, "DUNE_POLL_MAX_INTERVAL_SECS")?
                .unwrap_or(DEFAULT_POLL_MAX_INTERVAL_SECS),
            poll_max_attempts: profiled_env_parse(profile, "DUNE_POLL_MAX_ATTEMPTS")?,
            poll_timeout_secs: profiled_env_parse(profile, "DUNE_POLL_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
            request_timeout_secs: profiled_env_parse(profile, "DUNE_REQUEST_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }

    /// Poll policy derived from the `poll_*` settings.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            backoff_factor: self.poll_backoff_factor,
            max_interval: Duration::from_secs(self.poll_max_interval_secs),
            max_attempts: self.poll_max_attempts,
            timeout: (self.poll_timeout_secs > 0)
                .then(|| Duration::from_secs(self.poll_timeout_secs)),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl fmt::Debug for DuneConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuneConfig")
            .field("api_key", &"***")
            .field("query_id", &self.query_id)
            .field("base_url", &self.base_url)
            .field("output_dir", &self.output_dir)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("poll_backoff_factor", &self.poll_backoff_factor)
            .field("poll_max_interval_secs", &self.poll_max_interval_secs)
            .field("poll_max_attempts", &self.poll_max_attempts)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}
