//! Status polling with bounded exponential backoff.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::{DuneError, ExecutionApi};
use crate::result::{ExecutionHandle, ExecutionStatus};

/// How often and for how long to poll an execution's status.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Wait after the first in-progress status.
    pub interval: Duration,
    /// Multiplier applied to the wait after each in-progress status (>= 1.0).
    pub backoff_factor: f64,
    /// Upper bound for a single wait.
    pub max_interval: Duration,
    /// Give up after this many status calls.
    pub max_attempts: Option<u32>,
    /// Give up once this much time has passed since the first status call.
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            backoff_factor: 1.5,
            max_interval: Duration::from_secs(60),
            max_attempts: None,
            timeout: Some(Duration::from_secs(1800)),
        }
    }
}

impl PollPolicy {
    /// Fixed interval, no limits.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            backoff_factor: 1.0,
            max_interval: interval,
            max_attempts: None,
            timeout: None,
        }
    }

    /// Wait before the status call following the `attempt`-th (1-based)
    /// in-progress answer.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(64) as i32;
        let factor = self.backoff_factor.max(1.0).powi(exp);
        let secs = self.interval.as_secs_f64() * factor;
        let cap = self.max_interval.max(self.interval);
        if !secs.is_finite() || secs >= cap.as_secs_f64() {
            cap
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// Terminal status together with how many status calls it took.
#[derive(Debug, Clone, PartialEq)]
pub struct PollReport {
    pub status: ExecutionStatus,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Query the status of `handle` until it reaches a terminal state.
///
/// Returns the terminal status whether it succeeded or not; callers decide
/// what a failed execution means. Fails with [`DuneError::PollTimeout`] when
/// the policy's attempt cap or deadline is hit first.
pub async fn wait_for_completion<A>(
    api: &A,
    handle: &ExecutionHandle,
    policy: &PollPolicy,
) -> Result<PollReport, DuneError>
where
    A: ExecutionApi + ?Sized,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        let status = api.status(handle).await?;
        attempts += 1;

        info!(
            execution_id = %handle,
            state = %status.state,
            attempt = attempts,
            "Current state"
        );

        if status.state.is_terminal() {
            return Ok(PollReport {
                status,
                attempts,
                elapsed: start.elapsed(),
            });
        }

        let delay = policy.delay_for(attempts);
        let elapsed = start.elapsed();

        let out_of_attempts = policy.max_attempts.is_some_and(|max| attempts >= max);
        let past_deadline = policy
            .timeout
            .is_some_and(|timeout| elapsed + delay > timeout);
        if out_of_attempts || past_deadline {
            warn!(
                execution_id = %handle,
                attempts,
                elapsed_secs = elapsed.as_secs(),
                "Giving up on execution"
            );
            return Err(DuneError::PollTimeout {
                execution_id: handle.to_string(),
                attempts,
                elapsed,
            });
        }

        debug!(
            execution_id = %handle,
            delay_ms = delay.as_millis() as u64,
            "Waiting before next status check"
        );
        tokio::time::sleep(delay).await;
    }
}
