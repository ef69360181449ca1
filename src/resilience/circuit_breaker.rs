//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: upstream assumed down, calls go straight to the fallback
//! - Half-Open: a single probe call tests recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: failed / window >= failure_threshold, once window >= minimum_calls
//! Open → Half-Open: cooldown elapsed (checked lazily on the next call)
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails or times out, cooldown restarts
//! ```
//!
//! # Design Decisions
//! - One breaker per name, shared by every route that declares the name
//! - Window counts calls, not time; rejected calls are counted but not windowed
//! - All state lives behind a single mutex so updates are linearizable
//! - A permit dropped without an outcome is recorded as a failure
//! - Every transition starts a new epoch; outcomes of permits from an older
//!   epoch only update the totals

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::error::GatewayError;
use crate::observability::metrics;

/// Resolved breaker parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerSettings {
    pub name: String,
    pub failure_threshold: f64,
    pub window_size: usize,
    pub minimum_calls: usize,
    pub cooldown: Duration,
    pub call_timeout: Duration,
    pub fallback_path: String,
}

impl TryFrom<&CircuitBreakerConfig> for CircuitBreakerSettings {
    type Error = String;

    fn try_from(config: &CircuitBreakerConfig) -> Result<Self, Self::Error> {
        if config.name.trim().is_empty() {
            return Err("name is empty".into());
        }
        if !(config.failure_threshold > 0.0 && config.failure_threshold <= 1.0) {
            return Err(format!(
                "failure_threshold {} is outside (0, 1]",
                config.failure_threshold
            ));
        }
        if config.window_size == 0 {
            return Err("window_size must be at least 1".into());
        }
        let minimum_calls = config.minimum_calls.unwrap_or(config.window_size);
        if minimum_calls == 0 || minimum_calls > config.window_size {
            return Err(format!(
                "minimum_calls {} must be within 1..={}",
                minimum_calls, config.window_size
            ));
        }
        if config.call_timeout_ms == 0 {
            return Err("call_timeout_ms must be positive".into());
        }
        if !config.fallback_path.starts_with('/') {
            return Err(format!("fallback path '{}' must start with '/'", config.fallback_path));
        }

        Ok(Self {
            name: config.name.clone(),
            failure_threshold: config.failure_threshold,
            window_size: config.window_size,
            minimum_calls,
            cooldown: Duration::from_millis(config.cooldown_ms),
            call_timeout: Duration::from_millis(config.call_timeout_ms),
            fallback_path: config.fallback_path.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    /// Gauge value: 0 closed, 1 open, 2 half-open.
    pub fn as_gauge(self) -> f64 {
        match self {
            BreakerState::Closed => 0.0,
            BreakerState::Open => 1.0,
            BreakerState::HalfOpen => 2.0,
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerState::Closed => write!(f, "CLOSED"),
            BreakerState::Open => write!(f, "OPEN"),
            BreakerState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Result of one call made under a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
    Timeout,
}

impl CallOutcome {
    fn is_failure(self) -> bool {
        !matches!(self, CallOutcome::Success)
    }

    fn label(self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Failure => "failure",
            CallOutcome::Timeout => "timeout",
        }
    }
}

/// Cumulative counters since the breaker was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BreakerStats {
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    /// Calls short-circuited while open or while a probe was in flight.
    pub rejected: u64,
}

impl BreakerStats {
    /// Calls that actually reached the upstream.
    pub fn calls(&self) -> u64 {
        self.successes + self.failures + self.timeouts
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: BreakerState,
    pub stats: BreakerStats,
    pub window_calls: usize,
    pub window_failures: usize,
    pub millis_since_transition: u64,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    /// Most recent outcomes, `true` = failed.
    window: VecDeque<bool>,
    window_failures: usize,
    probe_in_flight: bool,
    /// Bumped on every transition.
    epoch: u64,
    last_transition: Instant,
    stats: BreakerStats,
}

impl Inner {
    fn push(&mut self, failed: bool, capacity: usize) {
        self.window.push_back(failed);
        if failed {
            self.window_failures += 1;
        }
        while self.window.len() > capacity {
            if self.window.pop_front() == Some(true) {
                self.window_failures -= 1;
            }
        }
    }

    fn clear_window(&mut self) {
        self.window.clear();
        self.window_failures = 0;
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    settings: CircuitBreakerSettings,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(settings: CircuitBreakerSettings) -> Self {
        let window = VecDeque::with_capacity(settings.window_size);
        metrics::record_breaker_state(&settings.name, BreakerState::Closed);
        Self {
            settings,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                window,
                window_failures: 0,
                probe_in_flight: false,
                epoch: 0,
                last_transition: Instant::now(),
                stats: BreakerStats::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &CircuitBreakerSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// Ask to make a call. `BreakerOpen` means the caller must use the fallback.
    pub fn try_acquire(self: &Arc<Self>) -> Result<CallPermit, GatewayError> {
        let mut inner = self.lock();
        let state = inner.state;
        let probe = match state {
            BreakerState::Closed => false,
            BreakerState::Open if inner.last_transition.elapsed() >= self.settings.cooldown => {
                self.transition(&mut inner, BreakerState::HalfOpen);
                inner.probe_in_flight = true;
                true
            }
            BreakerState::HalfOpen if !inner.probe_in_flight => {
                inner.probe_in_flight = true;
                true
            }
            BreakerState::Open | BreakerState::HalfOpen => {
                inner.stats.rejected += 1;
                metrics::record_breaker_call(&self.settings.name, "rejected");
                return Err(GatewayError::BreakerOpen {
                    name: self.settings.name.clone(),
                });
            }
        };

        Ok(CallPermit {
            breaker: Arc::clone(self),
            probe,
            epoch: inner.epoch,
            recorded: false,
        })
    }

    fn record(&self, probe: bool, epoch: u64, outcome: CallOutcome) {
        let mut inner = self.lock();
        match outcome {
            CallOutcome::Success => inner.stats.successes += 1,
            CallOutcome::Failure => inner.stats.failures += 1,
            CallOutcome::Timeout => inner.stats.timeouts += 1,
        }
        metrics::record_breaker_call(&self.settings.name, outcome.label());

        if probe {
            inner.probe_in_flight = false;
            if inner.state == BreakerState::HalfOpen && inner.epoch == epoch {
                let next = if outcome.is_failure() {
                    BreakerState::Open
                } else {
                    BreakerState::Closed
                };
                self.transition(&mut inner, next);
            }
            return;
        }

        // Calls admitted before the last transition only count toward the totals.
        if inner.state != BreakerState::Closed || inner.epoch != epoch {
            return;
        }

        inner.push(outcome.is_failure(), self.settings.window_size);
        let calls = inner.window.len();
        if calls >= self.settings.minimum_calls {
            let ratio = inner.window_failures as f64 / calls as f64;
            if ratio >= self.settings.failure_threshold {
                tracing::warn!(
                    breaker = %self.settings.name,
                    failures = inner.window_failures,
                    calls,
                    ratio,
                    "Failure threshold reached"
                );
                self.transition(&mut inner, BreakerState::Open);
            }
        }
    }

    /// Give back a permit whose call never reached the upstream.
    fn release(&self, probe: bool, epoch: u64) {
        let mut inner = self.lock();
        if probe && inner.epoch == epoch {
            inner.probe_in_flight = false;
        }
    }

    fn transition(&self, inner: &mut Inner, next: BreakerState) {
        let previous = inner.state;
        inner.state = next;
        inner.epoch += 1;
        inner.last_transition = Instant::now();
        if next != BreakerState::HalfOpen {
            inner.clear_window();
        }
        tracing::info!(
            breaker = %self.settings.name,
            from = %previous,
            to = %next,
            "Circuit breaker state change"
        );
        metrics::record_breaker_state(&self.settings.name, next);
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            name: self.settings.name.clone(),
            state: inner.state,
            stats: inner.stats,
            window_calls: inner.window.len(),
            window_failures: inner.window_failures,
            millis_since_transition: inner.last_transition.elapsed().as_millis() as u64,
        }
    }
}

/// Permission to make one upstream call.
///
/// Record the outcome with [`CallPermit::record`]. Dropping the permit
/// unrecorded (cancellation, panic) counts as a failure.
#[derive(Debug)]
pub struct CallPermit {
    breaker: Arc<CircuitBreaker>,
    probe: bool,
    epoch: u64,
    recorded: bool,
}

impl CallPermit {
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn record(mut self, outcome: CallOutcome) {
        self.recorded = true;
        self.breaker.record(self.probe, self.epoch, outcome);
    }

    /// Return the permit without an outcome. Nothing is counted.
    pub fn release(mut self) {
        self.recorded = true;
        self.breaker.release(self.probe, self.epoch);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.recorded {
            tracing::debug!(breaker = %self.breaker.name(), "Call abandoned, recording failure");
            self.breaker.record(self.probe, self.epoch, CallOutcome::Failure);
        }
    }
}

/// Named breakers, created lazily and kept for the process lifetime.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing breaker for `settings.name`, or a new one built from `settings`.
    pub fn get_or_create(&self, settings: &CircuitBreakerSettings) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(&settings.name) {
            return Arc::clone(existing.value());
        }
        self.breakers
            .entry(settings.name.clone())
            .or_insert_with(|| {
                tracing::debug!(breaker = %settings.name, "Creating circuit breaker");
                Arc::new(CircuitBreaker::new(settings.clone()))
            })
            .value()
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|b| Arc::clone(b.value()))
    }

    /// Snapshots of every breaker, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut all: Vec<_> = self.breakers.iter().map(|b| b.snapshot()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(window: usize, threshold: f64) -> CircuitBreakerSettings {
        CircuitBreakerSettings {
            name: "mycmd".into(),
            failure_threshold: threshold,
            window_size: window,
            minimum_calls: window,
            cooldown: Duration::from_secs(5),
            call_timeout: Duration::from_secs(1),
            fallback_path: "/fallback".into(),
        }
    }

    fn call(cb: &Arc<CircuitBreaker>, outcome: CallOutcome) {
        cb.try_acquire().unwrap().record(outcome);
    }

    #[test]
    fn stays_closed_until_window_is_full() {
        let cb = Arc::new(CircuitBreaker::new(settings(4, 0.5)));
        for _ in 0..3 {
            call(&cb, CallOutcome::Failure);
        }
        assert_eq!(cb.state(), BreakerState::Closed);

        call(&cb, CallOutcome::Failure);
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(matches!(cb.try_acquire(), Err(GatewayError::BreakerOpen { .. })));
        assert_eq!(cb.snapshot().stats.rejected, 1);
    }

    #[test]
    fn threshold_is_inclusive_over_sliding_window() {
        let cb = Arc::new(CircuitBreaker::new(settings(4, 0.5)));
        call(&cb, CallOutcome::Success);
        call(&cb, CallOutcome::Success);
        call(&cb, CallOutcome::Success);
        call(&cb, CallOutcome::Timeout);
        assert_eq!(cb.state(), BreakerState::Closed);

        // Window slides: [S, S, T, F] → 2/4 = 0.5 ≥ 0.5.
        call(&cb, CallOutcome::Failure);
        assert_eq!(cb.state(), BreakerState::Open);
    }

    #[test]
    fn old_failures_slide_out() {
        let cb = Arc::new(CircuitBreaker::new(settings(3, 1.0)));
        call(&cb, CallOutcome::Failure);
        call(&cb, CallOutcome::Failure);
        call(&cb, CallOutcome::Success);
        call(&cb, CallOutcome::Failure);
        assert_eq!(cb.state(), BreakerState::Closed);
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.window_calls, 3);
        assert_eq!(snapshot.window_failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_admits_a_single_probe() {
        let cb = Arc::new(CircuitBreaker::new(settings(1, 1.0)));
        call(&cb, CallOutcome::Timeout);
        assert_eq!(cb.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cb.try_acquire().is_err());

        tokio::time::advance(Duration::from_secs(1)).await;
        let probe = cb.try_acquire().unwrap();
        assert!(probe.is_probe());
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        assert!(cb.try_acquire().is_err(), "second caller must not probe");

        probe.record(CallOutcome::Success);
        assert_eq!(cb.state(), BreakerState::Closed);
        assert!(!cb.try_acquire().unwrap().is_probe());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probe_restarts_cooldown() {
        let cb = Arc::new(CircuitBreaker::new(settings(1, 1.0)));
        call(&cb, CallOutcome::Failure);

        tokio::time::advance(Duration::from_secs(5)).await;
        cb.try_acquire().unwrap().record(CallOutcome::Timeout);
        assert_eq!(cb.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(cb.try_acquire().is_err());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cb.try_acquire().unwrap().is_probe());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_probe_counts_as_failure() {
        let cb = Arc::new(CircuitBreaker::new(settings(1, 1.0)));
        call(&cb, CallOutcome::Failure);
        tokio::time::advance(Duration::from_secs(5)).await;

        drop(cb.try_acquire().unwrap());
        assert_eq!(cb.state(), BreakerState::Open);
        assert_eq!(cb.snapshot().stats.failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn outcomes_from_before_recovery_do_not_reopen() {
        let cb = Arc::new(CircuitBreaker::new(settings(2, 0.5)));
        let slow_a = cb.try_acquire().unwrap();
        let slow_b = cb.try_acquire().unwrap();
        call(&cb, CallOutcome::Failure);
        call(&cb, CallOutcome::Failure);
        assert_eq!(cb.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(5)).await;
        cb.try_acquire().unwrap().record(CallOutcome::Success);
        assert_eq!(cb.state(), BreakerState::Closed);

        slow_a.record(CallOutcome::Timeout);
        drop(slow_b);
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, BreakerState::Closed);
        assert_eq!(snapshot.window_calls, 0);
        assert_eq!(snapshot.stats.timeouts, 1);
        assert_eq!(snapshot.stats.failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn released_probe_frees_the_slot() {
        let cb = Arc::new(CircuitBreaker::new(settings(1, 1.0)));
        call(&cb, CallOutcome::Failure);
        tokio::time::advance(Duration::from_secs(5)).await;

        cb.try_acquire().unwrap().release();
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        assert_eq!(cb.snapshot().stats.calls(), 1);

        let probe = cb.try_acquire().unwrap();
        assert!(probe.is_probe());
        probe.record(CallOutcome::Success);
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn counters_are_consistent_across_threads() {
        const THREADS: usize = 8;
        const CALLS: usize = 500;

        let mut config = settings(10, 0.5);
        config.cooldown = Duration::ZERO;
        let cb = Arc::new(CircuitBreaker::new(config));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let cb = Arc::clone(&cb);
                std::thread::spawn(move || {
                    for i in 0..CALLS {
                        if let Ok(permit) = cb.try_acquire() {
                            let outcome = match (t + i) % 3 {
                                0 => CallOutcome::Failure,
                                1 => CallOutcome::Timeout,
                                _ => CallOutcome::Success,
                            };
                            permit.record(outcome);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = cb.snapshot();
        assert_eq!(
            snapshot.stats.calls() + snapshot.stats.rejected,
            (THREADS * CALLS) as u64
        );
        assert!(snapshot.window_failures <= snapshot.window_calls);
        assert!(snapshot.window_calls <= 10);
    }

    #[test]
    fn registry_shares_breakers_by_name() {
        let registry = BreakerRegistry::new();
        let a = registry.get_or_create(&settings(4, 0.5));
        let b = registry.get_or_create(&settings(10, 0.9));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.settings().window_size, 4);
        assert_eq!(registry.snapshots().len(), 1);
        assert!(registry.get("other").is_none());
    }

    #[test]
    fn settings_default_minimum_calls_to_window() {
        let mut config = CircuitBreakerConfig::new("mycmd", "/fallback");
        config.window_size = 8;
        let resolved = CircuitBreakerSettings::try_from(&config).unwrap();
        assert_eq!(resolved.minimum_calls, 8);
        assert_eq!(resolved.call_timeout, Duration::from_secs(1));

        config.minimum_calls = Some(3);
        assert_eq!(CircuitBreakerSettings::try_from(&config).unwrap().minimum_calls, 3);

        config.minimum_calls = Some(9);
        assert!(CircuitBreakerSettings::try_from(&config).is_err());

        config.minimum_calls = None;
        config.failure_threshold = 0.0;
        assert!(CircuitBreakerSettings::try_from(&config).is_err());
    }
}
