//! Retry pacing: randomized delays under a wall-clock budget.
//!
//! The clock is a trait so the transport can be driven by a fake clock in
//! tests without sleeping for real.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

/// Monotonic time source plus sleep.
#[async_trait]
pub trait Clock: Send + Sync + fmt::Debug {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;

    async fn sleep(&self, delay: Duration);
}

/// Clock backed by tokio's timer.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Clock that only advances when slept on; records every sleep.
///
/// Clones share state, so a test can keep one handle and give another to the
/// client.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

#[derive(Debug, Default)]
struct ManualState {
    now: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay slept so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, by: Duration) {
        self.lock().now += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        // A poisoned lock only means another test thread panicked mid-update.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.lock().now
    }

    async fn sleep(&self, delay: Duration) {
        let mut state = self.lock();
        state.now += delay;
        state.sleeps.push(delay);
    }
}

/// Delay generator and retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total time a request may keep failing before giving up.
    pub budget: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl BackoffPolicy {
    pub fn new(budget: Duration, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            budget,
            min_delay,
            max_delay,
        }
    }

    /// Whether another attempt is allowed for a request started at `started`.
    pub fn within_budget(&self, started: Duration, now: Duration) -> bool {
        started + self.budget > now
    }

    /// Uniformly random whole-second delay in `[min_delay, max_delay]`.
    pub fn next_delay(&self) -> Duration {
        let min = self.min_delay.as_secs();
        let max = self.max_delay.as_secs().max(min);
        Duration::from_secs(rand::thread_rng().gen_range(min..=max))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(600),
            Duration::from_secs(300),
            Duration::from_secs(600),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_stays_in_bounds() {
        let policy = BackoffPolicy::default();
        for _ in 0..200 {
            let delay = policy.next_delay();
            assert!(delay >= Duration::from_secs(300), "{delay:?}");
            assert!(delay <= Duration::from_secs(600), "{delay:?}");
        }
    }

    #[test]
    fn test_budget_is_exclusive() {
        let policy = BackoffPolicy::new(
            Duration::from_secs(10),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        assert!(policy.within_budget(Duration::ZERO, Duration::from_secs(9)));
        assert!(!policy.within_budget(Duration::ZERO, Duration::from_secs(10)));
    }

    #[test]
    fn test_zero_budget_never_retries() {
        let policy = BackoffPolicy::new(Duration::ZERO, Duration::ZERO, Duration::ZERO);
        assert!(!policy.within_budget(Duration::ZERO, Duration::ZERO));
    }

    #[tokio::test]
    async fn test_manual_clock_records_sleeps() {
        let clock = ManualClock::new();
        let handle = clock.clone();

        clock.sleep(Duration::from_secs(5)).await;
        clock.advance(Duration::from_secs(1));
        clock.sleep(Duration::from_secs(7)).await;

        assert_eq!(handle.now(), Duration::from_secs(13));
        assert_eq!(
            handle.sleeps(),
            vec![Duration::from_secs(5), Duration::from_secs(7)]
        );
    }
}
