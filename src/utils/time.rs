use std::time::{Duration, Instant};

/// Fires at most once per `period`.
///
/// A zero period never fires.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    period: Duration,
    last_fired: Instant,
}

impl IntervalTimer {
    /// Creates a timer whose first period starts at `now`.
    #[must_use]
    pub fn new(period: Duration, now: Instant) -> Self {
        Self {
            period,
            last_fired: now,
        }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.period.is_zero()
    }

    /// Returns `true` and restarts the period if `now` is at least one period
    /// past the last firing.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.is_enabled() || now.saturating_duration_since(self.last_fired) < self.period {
            return false;
        }
        self.last_fired = now;
        true
    }

    /// Restarts the period at `now` without firing.
    pub fn reset(&mut self, now: Instant) {
        self.last_fired = now;
    }
}

/// Logs a warning if the scope it guards runs longer than `budget`.
pub struct ScopeTimeGuard {
    name: &'static str,
    budget: Duration,
    start: Instant,
}

impl ScopeTimeGuard {
    #[must_use]
    pub fn new(name: &'static str, budget: Duration) -> Self {
        Self {
            name,
            budget,
            start: Instant::now(),
        }
    }
}

impl Drop for ScopeTimeGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        if elapsed > self.budget {
            log::warn!(
                "{} took {:.3} ms (budget {:.3} ms)",
                self.name,
                elapsed.as_secs_f64() * 1000.0,
                self.budget.as_secs_f64() * 1000.0
            );
        }
    }
}
