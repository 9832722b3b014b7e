//! Per-bidder circuit breaker (spec.md §4.4).
//!
//! Grounded on the teacher's per-key lock idiom in
//! `core/config_manager.rs` (`parking_lot::RwLock` guarding a single
//! mutable value) and `core/managers/publishers.rs` (copy-on-write
//! `ArcSwap` table), combined into a `DashMap<bidder, Mutex<CircuitState>>`
//! per SPEC_FULL.md §5: one small-critical-section mutex per bidder
//! rather than a single lock over the whole table.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitState {
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub opened_at: Option<Instant>,
    pub allowances_remaining: u32,
    pub rejects: u64,
    pub successes: u64,
    pub last_change_at: Instant,
}

impl Default for CircuitState {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            allowances_remaining: 0,
            rejects: 0,
            successes: 0,
            last_change_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_duration: Duration,
    pub half_open_probes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(30),
            half_open_probes: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct CircuitStats {
    pub state: BreakerState,
    pub failure_count: u32,
    pub rejects: u64,
    pub successes: u64,
}

/// A table of one state machine per bidder. Cheap to share: `Arc` the
/// whole breaker, each bidder's critical section is independent.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    table: DashMap<String, Mutex<CircuitState>, ahash::RandomState>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            table: DashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    fn entry(&self, bidder: &str) -> dashmap::mapref::one::Ref<'_, String, Mutex<CircuitState>> {
        if !self.table.contains_key(bidder) {
            self.table
                .entry(bidder.to_string())
                .or_insert_with(|| Mutex::new(CircuitState::default()));
        }
        self.table.get(bidder).expect("just inserted")
    }

    /// Attempts to acquire a dispatch slot for `bidder`. Returns `true`
    /// when the call may proceed (closed, or a half-open probe
    /// allowance is available), `false` when it must be rejected.
    pub fn try_acquire(&self, bidder: &str) -> bool {
        let entry = self.entry(bidder);
        let mut state = entry.lock();

        match state.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = state.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.open_duration {
                    state.state = BreakerState::HalfOpen;
                    state.allowances_remaining = self.config.half_open_probes;
                    state.last_change_at = Instant::now();
                    if state.allowances_remaining > 0 {
                        state.allowances_remaining -= 1;
                        true
                    } else {
                        state.rejects += 1;
                        false
                    }
                } else {
                    state.rejects += 1;
                    false
                }
            }
            BreakerState::HalfOpen => {
                if state.allowances_remaining > 0 {
                    state.allowances_remaining -= 1;
                    true
                } else {
                    state.rejects += 1;
                    false
                }
            }
        }
    }

    /// Records the outcome of a dispatched call. "Failure" per spec.md
    /// §4.4 means transport error, timeout, or 5xx; 4xx and no-bids must
    /// be reported as [`CallOutcome::Success`] by the caller.
    pub fn record(&self, bidder: &str, outcome: CallOutcome) {
        let entry = self.entry(bidder);
        let mut state = entry.lock();

        match outcome {
            CallOutcome::Success => {
                state.successes += 1;
                if state.state != BreakerState::Closed {
                    state.state = BreakerState::Closed;
                    state.last_change_at = Instant::now();
                }
                state.consecutive_failures = 0;
                state.opened_at = None;
            }
            CallOutcome::Failure => {
                state.consecutive_failures += 1;

                match state.state {
                    BreakerState::Closed => {
                        if state.consecutive_failures >= self.config.failure_threshold {
                            state.state = BreakerState::Open;
                            state.opened_at = Some(Instant::now());
                            state.last_change_at = Instant::now();
                        }
                    }
                    BreakerState::HalfOpen => {
                        state.state = BreakerState::Open;
                        state.opened_at = Some(Instant::now());
                        state.last_change_at = Instant::now();
                    }
                    BreakerState::Open => {}
                }
            }
        }
    }

    pub fn stats(&self) -> std::collections::HashMap<String, CircuitStats> {
        self.table
            .iter()
            .map(|entry| {
                let state = entry.value().lock();
                (
                    entry.key().clone(),
                    CircuitStats {
                        state: state.state,
                        failure_count: state.consecutive_failures,
                        rejects: state.rejects,
                        successes: state.successes,
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker_with_threshold(n: u32) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: n,
            open_duration: Duration::from_millis(20),
            half_open_probes: 1,
        })
    }

    #[test]
    fn closed_allows_calls() {
        let cb = breaker_with_threshold(5);
        assert!(cb.try_acquire("a"));
    }

    #[test]
    fn opens_after_threshold_failures() {
        let cb = breaker_with_threshold(3);
        for _ in 0..3 {
            assert!(cb.try_acquire("a"));
            cb.record("a", CallOutcome::Failure);
        }
        assert!(!cb.try_acquire("a"));
    }

    #[test]
    fn monotonicity_opens_within_threshold_calls_of_first_failure() {
        // Property 7: a bidder with 100% failure reaches open state at
        // most `failure_threshold` calls after the first failure.
        let threshold = 5;
        let cb = breaker_with_threshold(threshold);
        let mut calls_until_open = 0;
        for _ in 0..threshold {
            if !cb.try_acquire("a") {
                break;
            }
            calls_until_open += 1;
            cb.record("a", CallOutcome::Failure);
        }
        assert!(calls_until_open <= threshold);
        assert!(!cb.try_acquire("a"));
    }

    #[test]
    fn half_open_probe_then_close_on_success() {
        let cb = breaker_with_threshold(1);
        assert!(cb.try_acquire("a"));
        cb.record("a", CallOutcome::Failure);
        assert!(!cb.try_acquire("a"));

        std::thread::sleep(Duration::from_millis(30));

        assert!(cb.try_acquire("a"));
        cb.record("a", CallOutcome::Success);

        assert!(cb.try_acquire("a"));
        let stats = cb.stats();
        assert_eq!(stats["a"].state, BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let cb = breaker_with_threshold(1);
        cb.try_acquire("a");
        cb.record("a", CallOutcome::Failure);

        std::thread::sleep(Duration::from_millis(30));

        assert!(cb.try_acquire("a"));
        cb.record("a", CallOutcome::Failure);

        assert!(!cb.try_acquire("a"));
        assert_eq!(cb.stats()["a"].state, BreakerState::Open);
    }

    #[test]
    fn four_xx_and_no_bid_do_not_count_as_failures() {
        let cb = breaker_with_threshold(2);
        for _ in 0..10 {
            cb.try_acquire("a");
            cb.record("a", CallOutcome::Success);
        }
        assert_eq!(cb.stats()["a"].state, BreakerState::Closed);
    }
}
