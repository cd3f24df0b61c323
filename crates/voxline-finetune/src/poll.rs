//! Bounded polling of a hosted record until it reaches a terminal state.
//!
//! States: `Pending -> Succeeded | Failed`, with `TimedOut` when the deadline
//! or attempt cap is hit first. A failed status ends polling at once.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use voxline_types::{Lifecycle, Phase};

fn default_interval_seconds() -> u64 {
    5
}

fn default_max_wait_seconds() -> u64 {
    600
}

/// Interval and bounds for one polling loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Fixed delay between status requests.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Give up once another wait would pass this much total time.
    #[serde(default = "default_max_wait_seconds")]
    pub max_wait_seconds: u64,
    /// Optional cap on the number of status requests.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            max_wait_seconds: default_max_wait_seconds(),
            max_attempts: None,
        }
    }
}

impl PollPolicy {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self {
            interval_seconds: interval.as_secs(),
            max_wait_seconds: max_wait.as_secs(),
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Delay between status requests, never below one second.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_seconds)
    }

    /// Rejects settings that would poll without pausing or not wait at all.
    pub fn check(&self) -> Result<(), &'static str> {
        if self.interval_seconds == 0 {
            return Err("interval_seconds must be at least 1");
        }
        if self.max_wait_seconds == 0 {
            return Err("max_wait_seconds must be at least 1");
        }
        if self.max_attempts == Some(0) {
            return Err("max_attempts must be at least 1 when set");
        }
        Ok(())
    }
}

/// How a polling loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Succeeded {
        attempts: u32,
    },
    Failed {
        reason: Option<String>,
        attempts: u32,
    },
    TimedOut {
        attempts: u32,
        elapsed: Duration,
    },
}

/// Calls `fetch` at `policy.interval()` until the returned status is
/// terminal or the policy's bounds are reached.
///
/// The first request is made immediately. Errors from `fetch` end the loop
/// and are returned as-is.
pub async fn poll_until_terminal<S, E, F, Fut>(
    policy: &PollPolicy,
    mut fetch: F,
) -> Result<PollOutcome, E>
where
    S: Lifecycle + Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S, E>>,
{
    let started = Instant::now();
    let interval = policy.interval();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let status = fetch().await?;

        match status.phase() {
            Phase::Succeeded => return Ok(PollOutcome::Succeeded { attempts }),
            Phase::Failed(reason) => return Ok(PollOutcome::Failed { reason, attempts }),
            Phase::Pending => {}
        }

        let elapsed = started.elapsed();
        let attempts_exhausted = policy.max_attempts.is_some_and(|max| attempts >= max);
        if attempts_exhausted || elapsed + interval > policy.max_wait() {
            return Ok(PollOutcome::TimedOut { attempts, elapsed });
        }

        tracing::info!(
            attempts,
            status = ?status,
            wait_seconds = interval.as_secs(),
            "still processing, waiting before next status check"
        );
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use voxline_types::DatasetStatus;

    #[tokio::test(start_paused = true)]
    async fn first_poll_success_makes_one_request() {
        let calls = Cell::new(0);
        let outcome = poll_until_terminal(&PollPolicy::default(), || {
            calls.set(calls.get() + 1);
            async { Ok::<_, ()>(DatasetStatus::Validated) }
        })
        .await
        .unwrap();
        assert_eq!(outcome, PollOutcome::Succeeded { attempts: 1 });
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_error_ends_the_loop() {
        let outcome: Result<PollOutcome, &str> =
            poll_until_terminal(&PollPolicy::default(), || async {
                Err::<DatasetStatus, _>("boom")
            })
            .await;
        assert_eq!(outcome, Err("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_cap_times_out() {
        let policy = PollPolicy::default().with_max_attempts(3);
        let outcome = poll_until_terminal(&policy, || async {
            Ok::<_, ()>(DatasetStatus::Validating)
        })
        .await
        .unwrap();
        assert!(matches!(outcome, PollOutcome::TimedOut { attempts: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_still_waits_between_polls() {
        let policy = PollPolicy {
            interval_seconds: 0,
            max_wait_seconds: 10,
            max_attempts: None,
        };
        assert!(policy.check().is_err());

        let calls = Cell::new(0);
        let outcome = poll_until_terminal(&policy, || {
            calls.set(calls.get() + 1);
            async { Ok::<_, ()>(DatasetStatus::Validating) }
        })
        .await
        .unwrap();

        assert_eq!(
            outcome,
            PollOutcome::TimedOut {
                attempts: 11,
                elapsed: Duration::from_secs(10)
            }
        );
        assert_eq!(calls.get(), 11);
    }

    #[test]
    fn policy_check_rejects_degenerate_bounds() {
        assert!(PollPolicy::default().check().is_ok());
        let no_wait = PollPolicy {
            max_wait_seconds: 0,
            ..PollPolicy::default()
        };
        assert!(no_wait.check().is_err());
        assert!(PollPolicy::default().with_max_attempts(0).check().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_times_out() {
        let policy = PollPolicy::new(Duration::from_secs(5), Duration::from_secs(20));
        let outcome = poll_until_terminal(&policy, || async {
            Ok::<_, ()>(DatasetStatus::Created)
        })
        .await
        .unwrap();
        match outcome {
            PollOutcome::TimedOut { attempts, elapsed } => {
                assert_eq!(attempts, 5);
                assert_eq!(elapsed, Duration::from_secs(20));
            }
            other => panic!("Expected TimedOut, got {:?}", other),
        }
    }
}
