//! Exponential-backoff retry around an async operation.
//!
//! Whether an error is worth another attempt is decided by the error itself
//! through [`Retryable`]; this module never second-guesses it.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

pub trait Retryable {
  fn is_retryable(&self) -> bool;
  /// Error to surface when an attempt loses the race against `attempt_timeout`.
  fn timed_out(after: Duration) -> Self;
  /// Minimum wait the failing side asked for before the next attempt.
  fn retry_after(&self) -> Option<Duration> {
    None
  }
}

#[derive(Clone, Debug)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub base_delay: Duration,
  pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_attempts: 3, base_delay: Duration::from_millis(1000), attempt_timeout: None }
  }
}

impl RetryPolicy {
  /// Delay before the attempt following `attempt` (0-based): base * 2^attempt. No jitter.
  pub fn delay_for(&self, attempt: u32) -> Duration {
    self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
  }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the policy
/// runs out of attempts. Attempts are strictly sequential. Returns the last error.
///
/// `gate` is awaited before every attempt and is not covered by `attempt_timeout`,
/// so waiting for a local rate-limit slot never turns into a timeout.
pub async fn retry_with_backoff<T, E, G, GFut, F, Fut>(policy: &RetryPolicy, mut gate: G, mut op: F) -> Result<T, E>
where
  E: Retryable + std::fmt::Display,
  G: FnMut() -> GFut,
  GFut: Future<Output = ()>,
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
{
  let max = policy.max_attempts.max(1);
  let mut attempt = 0;
  loop {
    gate().await;
    let outcome = match policy.attempt_timeout {
      Some(limit) => match tokio::time::timeout(limit, op()).await {
        Ok(r) => r,
        Err(_) => Err(E::timed_out(limit)),
      },
      None => op().await,
    };

    match outcome {
      Ok(v) => {
        if attempt > 0 {
          debug!(target: "studysheet", attempts = attempt + 1, "Operation succeeded after retry");
        }
        return Ok(v);
      }
      Err(e) if !e.is_retryable() => {
        debug!(target: "studysheet", error = %e, "Non-retryable error; giving up");
        return Err(e);
      }
      Err(e) if attempt + 1 >= max => {
        warn!(target: "studysheet", attempts = max, error = %e, "Retry attempts exhausted");
        return Err(e);
      }
      Err(e) => {
        let backoff = policy.delay_for(attempt);
        let delay = e.retry_after().map_or(backoff, |after| backoff.max(after));
        warn!(target: "studysheet", attempt = attempt + 1, ?delay, error = %e, "Attempt failed; backing off");
        tokio::time::sleep(delay).await;
        attempt += 1;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Instant;

  #[derive(Debug, PartialEq)]
  enum TestError {
    Flaky,
    Fatal,
    Slow,
    Throttled(Duration),
  }

  impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      write!(f, "{:?}", self)
    }
  }

  impl Retryable for TestError {
    fn is_retryable(&self) -> bool { !matches!(self, TestError::Fatal) }
    fn timed_out(_after: Duration) -> Self { TestError::Slow }
    fn retry_after(&self) -> Option<Duration> {
      match self {
        TestError::Throttled(after) => Some(*after),
        _ => None,
      }
    }
  }

  fn no_gate() -> std::future::Ready<()> {
    std::future::ready(())
  }

  fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy { max_attempts, base_delay: Duration::from_millis(1), attempt_timeout: None }
  }

  #[tokio::test]
  async fn succeeds_on_third_attempt() {
    let calls = AtomicU32::new(0);
    let out: Result<&str, TestError> = retry_with_backoff(&fast_policy(3), no_gate, || {
      let n = calls.fetch_add(1, Ordering::SeqCst);
      async move { if n < 2 { Err(TestError::Flaky) } else { Ok("done") } }
    })
    .await;
    assert_eq!(out, Ok("done"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn non_retryable_runs_once() {
    let calls = AtomicU32::new(0);
    let out: Result<(), TestError> = retry_with_backoff(&fast_policy(5), no_gate, || {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Err(TestError::Fatal) }
    })
    .await;
    assert_eq!(out, Err(TestError::Fatal));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn returns_last_error_when_exhausted() {
    let calls = AtomicU32::new(0);
    let out: Result<(), TestError> = retry_with_backoff(&fast_policy(2), no_gate, || {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Err(TestError::Flaky) }
    })
    .await;
    assert_eq!(out, Err(TestError::Flaky));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn attempt_timeout_maps_to_timed_out() {
    let policy = RetryPolicy {
      max_attempts: 1,
      base_delay: Duration::from_millis(1),
      attempt_timeout: Some(Duration::from_millis(5)),
    };
    let out: Result<(), TestError> = retry_with_backoff(&policy, no_gate, || async {
      tokio::time::sleep(Duration::from_secs(5)).await;
      Ok(())
    })
    .await;
    assert_eq!(out, Err(TestError::Slow));
  }

  #[tokio::test]
  async fn server_retry_after_stretches_the_backoff() {
    let calls = AtomicU32::new(0);
    let started = Instant::now();
    let out: Result<&str, TestError> = retry_with_backoff(&fast_policy(2), no_gate, || {
      let n = calls.fetch_add(1, Ordering::SeqCst);
      async move { if n == 0 { Err(TestError::Throttled(Duration::from_millis(80))) } else { Ok("done") } }
    })
    .await;
    assert_eq!(out, Ok("done"));
    assert!(started.elapsed() >= Duration::from_millis(80));
  }

  #[tokio::test]
  async fn gate_wait_is_outside_the_attempt_timeout() {
    let policy = RetryPolicy {
      max_attempts: 1,
      base_delay: Duration::from_millis(1),
      attempt_timeout: Some(Duration::from_millis(20)),
    };
    let gates = AtomicU32::new(0);
    let out: Result<&str, TestError> = retry_with_backoff(
      &policy,
      || {
        gates.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(60))
      },
      || async { Ok("sent") },
    )
    .await;
    assert_eq!(out, Ok("sent"));
    assert_eq!(gates.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn delay_doubles_per_attempt() {
    let p = RetryPolicy::default();
    assert_eq!(p.delay_for(0), Duration::from_millis(1000));
    assert_eq!(p.delay_for(1), Duration::from_millis(2000));
    assert_eq!(p.delay_for(2), Duration::from_millis(4000));
  }
}
