//! Bounded exponential backoff used by the readiness poller.

use std::time::Duration;

/// Retry budget for readiness polling.
///
/// The interval starts at `initial_interval` and grows by `multiplier` up to
/// `max_interval`. The sum of all intervals never exceeds `max_elapsed`: the
/// schedule is finite by construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryBudget {
    /// First sleep between attempts
    pub initial_interval: Duration,
    /// Growth factor applied after every sleep
    pub multiplier: f64,
    /// Upper bound for a single sleep
    pub max_interval: Duration,
    /// Upper bound for the total time spent sleeping
    pub max_elapsed: Duration,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(5),
            max_elapsed: Duration::from_secs(60),
        }
    }
}

impl RetryBudget {
    /// Default schedule with a different total wait.
    pub fn with_max_elapsed(max_elapsed: Duration) -> Self {
        Self {
            max_elapsed,
            ..Self::default()
        }
    }

    /// Short, fixed-interval budget for tests against local listeners.
    pub fn fixed(interval: Duration, max_elapsed: Duration) -> Self {
        Self {
            initial_interval: interval,
            multiplier: 1.0,
            max_interval: interval,
            max_elapsed,
        }
    }

    /// Sleep intervals between attempts, in order.
    pub fn intervals(&self) -> Intervals {
        Intervals {
            budget: *self,
            current: self.initial_interval.min(self.max_interval),
            spent: Duration::ZERO,
        }
    }

    /// Upper bound on the number of dial attempts this budget allows.
    pub fn max_attempts(&self) -> usize {
        self.intervals().count() + 1
    }

    fn grow(&self, interval: Duration) -> Duration {
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        interval.mul_f64(multiplier).min(self.max_interval)
    }
}

/// Iterator over the sleep intervals of a [`RetryBudget`].
#[derive(Clone, Debug)]
pub struct Intervals {
    budget: RetryBudget,
    current: Duration,
    spent: Duration,
}

impl Iterator for Intervals {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let remaining = self.budget.max_elapsed.saturating_sub(self.spent);
        if remaining.is_zero() || self.current.is_zero() {
            return None;
        }
        let delay = self.current.min(remaining);
        self.spent += delay;
        self.current = self.budget.grow(self.current);
        Some(delay)
    }
}
