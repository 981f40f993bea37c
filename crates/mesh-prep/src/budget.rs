//! Wall-clock budgets for the two stages with pathological inputs:
//! thickness ray casting and decimation.
//!
//! A [`Deadline`] is polled from inner loops. It is `Sync`, so rayon workers
//! can share one by reference; once any worker observes expiry the flag is
//! latched and the rest stop at their next poll.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A wall-clock budget started at construction.
#[derive(Debug)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
    expired: AtomicBool,
}

impl Deadline {
    /// Start a budget of the given length now.
    pub fn new(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
            expired: AtomicBool::new(false),
        }
    }

    /// A budget that never runs out.
    pub fn unlimited() -> Self {
        Self::new(Duration::MAX)
    }

    /// Check whether the budget is used up.
    #[inline]
    pub fn is_expired(&self) -> bool {
        if self.expired.load(Ordering::Relaxed) {
            return true;
        }
        if self.start.elapsed() >= self.budget {
            self.expired.store(true, Ordering::Relaxed);
            return true;
        }
        false
    }

    /// Mark the budget as spent immediately.
    pub fn expire(&self) {
        self.expired.store(true, Ordering::Relaxed);
    }

    /// Time since the budget started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// The configured budget.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_budget_is_expired() {
        let deadline = Deadline::new(Duration::ZERO);
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_unlimited_never_expires() {
        let deadline = Deadline::unlimited();
        assert!(!deadline.is_expired());
        assert!(deadline.remaining() > Duration::from_secs(3600));
    }

    #[test]
    fn test_manual_expire_latches() {
        let deadline = Deadline::new(Duration::from_secs(60));
        assert!(!deadline.is_expired());
        deadline.expire();
        assert!(deadline.is_expired());
    }
}
