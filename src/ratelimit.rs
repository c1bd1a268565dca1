//! Sliding-window self-throttle for outbound AI calls.
//!
//! Advisory only: it lowers the odds of an upstream 429, it does not replace the
//! provider's own limits. State lives in memory and resets on restart.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RateLimiter {
  window: Duration,
  max_requests: usize,
  stamps: VecDeque<Instant>,
}

impl RateLimiter {
  pub fn new(max_requests: usize, window: Duration) -> Self {
    Self { window, max_requests: max_requests.max(1), stamps: VecDeque::new() }
  }

  pub fn can_make_request(&mut self) -> bool {
    self.can_make_request_at(Instant::now())
  }

  pub fn record_request(&mut self) {
    self.record_request_at(Instant::now())
  }

  /// How long until the oldest stamp leaves the window. Zero when a slot is free.
  pub fn wait_time(&mut self) -> Duration {
    self.wait_time_at(Instant::now())
  }

  pub fn can_make_request_at(&mut self, now: Instant) -> bool {
    self.prune(now);
    self.stamps.len() < self.max_requests
  }

  pub fn record_request_at(&mut self, now: Instant) {
    self.prune(now);
    self.stamps.push_back(now);
  }

  pub fn wait_time_at(&mut self, now: Instant) -> Duration {
    if self.can_make_request_at(now) {
      return Duration::ZERO;
    }
    match self.stamps.front() {
      Some(oldest) => (*oldest + self.window).saturating_duration_since(now),
      None => Duration::ZERO,
    }
  }

  /// Requests still counted against the window.
  pub fn in_window(&mut self, now: Instant) -> usize {
    self.prune(now);
    self.stamps.len()
  }

  fn prune(&mut self, now: Instant) {
    while let Some(oldest) = self.stamps.front() {
      if now.saturating_duration_since(*oldest) >= self.window {
        self.stamps.pop_front();
      } else {
        break;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blocks_at_ceiling_and_recovers_after_window() {
    let mut rl = RateLimiter::new(3, Duration::from_secs(60));
    let t0 = Instant::now();
    for i in 0..3 {
      assert!(rl.can_make_request_at(t0 + Duration::from_secs(i)));
      rl.record_request_at(t0 + Duration::from_secs(i));
    }
    let t1 = t0 + Duration::from_secs(10);
    assert!(!rl.can_make_request_at(t1));
    assert_eq!(rl.wait_time_at(t1), Duration::from_secs(50));

    let t2 = t0 + Duration::from_secs(61);
    assert!(rl.can_make_request_at(t2));
    assert_eq!(rl.wait_time_at(t2), Duration::ZERO);
    assert_eq!(rl.in_window(t2), 1);

    let t3 = t0 + Duration::from_secs(63);
    assert_eq!(rl.in_window(t3), 0);
  }

  #[test]
  fn zero_ceiling_is_clamped_to_one() {
    let mut rl = RateLimiter::new(0, Duration::from_secs(1));
    let now = Instant::now();
    assert!(rl.can_make_request_at(now));
    rl.record_request_at(now);
    assert!(!rl.can_make_request_at(now));
  }
}
