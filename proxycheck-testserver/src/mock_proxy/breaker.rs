use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakerOptions {
    /// Consecutive upstream failures that trip the breaker.
    pub failure_threshold: u32,
    /// Successes in half-open that close it again.
    pub success_threshold: u32,
    /// Time spent open before a request is let through as a half-open probe.
    pub open_timeout: Duration,
}

impl Default for BreakerOptions {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failures: u32,
    pub successes: u32,
    pub total_failures: u64,
    pub total_successes: u64,
    pub rejected: u64,
}

/// Per-target breaker. The open -> half_open transition happens lazily on the first request
/// admitted after `open_timeout`.
#[derive(Debug, Clone)]
pub(crate) struct Breaker {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    total_failures: u64,
    total_successes: u64,
    rejected: u64,
}

impl Default for Breaker {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
            total_failures: 0,
            total_successes: 0,
            rejected: 0,
        }
    }
}

impl Breaker {
    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    /// Whether a request may reach the upstream. Returns the state it was admitted under.
    pub(crate) fn admit(&mut self, opts: &BreakerOptions) -> Option<CircuitState> {
        if self.state == CircuitState::Open {
            let expired = self
                .opened_at
                .is_none_or(|at| at.elapsed() >= opts.open_timeout);
            if !expired {
                self.rejected += 1;
                return None;
            }
            self.state = CircuitState::HalfOpen;
            self.consecutive_successes = 0;
        }
        Some(self.state)
    }

    pub(crate) fn record(&mut self, success: bool, opts: &BreakerOptions) {
        if success {
            self.total_successes += 1;
            self.consecutive_failures = 0;
            if self.state == CircuitState::HalfOpen {
                self.consecutive_successes += 1;
                if self.consecutive_successes >= opts.success_threshold {
                    self.state = CircuitState::Closed;
                    self.consecutive_successes = 0;
                    self.opened_at = None;
                }
            }
            return;
        }

        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
        let trip = match self.state {
            CircuitState::Closed => self.consecutive_failures >= opts.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };
        if trip {
            self.state = CircuitState::Open;
            self.opened_at = Some(Instant::now());
        }
    }

    pub(crate) fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state,
            failures: self.consecutive_failures,
            successes: self.consecutive_successes,
            total_failures: self.total_failures,
            total_successes: self.total_successes,
            rejected: self.rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> BreakerOptions {
        BreakerOptions {
            failure_threshold: 3,
            success_threshold: 2,
            open_timeout: Duration::from_millis(20),
        }
    }

    #[test]
    fn trips_after_consecutive_failures() {
        let o = opts();
        let mut b = Breaker::default();
        b.record(false, &o);
        b.record(false, &o);
        b.record(true, &o);
        b.record(false, &o);
        b.record(false, &o);
        assert_eq!(b.state(), CircuitState::Closed);
        b.record(false, &o);
        assert_eq!(b.state(), CircuitState::Open);
        assert_eq!(b.admit(&o), None);
        assert_eq!(b.snapshot().rejected, 1);
    }

    #[test]
    fn full_cycle_through_half_open() {
        let o = opts();
        let mut b = Breaker::default();
        for _ in 0..3 {
            b.record(false, &o);
        }
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(b.admit(&o), Some(CircuitState::HalfOpen));
        b.record(true, &o);
        assert_eq!(b.state(), CircuitState::HalfOpen);
        b.record(true, &o);
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let o = opts();
        let mut b = Breaker::default();
        for _ in 0..3 {
            b.record(false, &o);
        }
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(b.admit(&o), Some(CircuitState::HalfOpen));
        b.record(false, &o);
        assert_eq!(b.state(), CircuitState::Open);
        assert_eq!(
            serde_json::to_value(b.snapshot().state).ok(),
            Some(serde_json::json!("open"))
        );
    }
}
