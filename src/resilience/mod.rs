//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to upstream through a circuit breaker filter:
//!     → circuit_breaker.rs (permit or BreakerOpen)
//!     → timeouts.rs (enforce the breaker's call timeout)
//!     → circuit_breaker.rs (record outcome, maybe change state)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every breaker call has a deadline
//! - No retries: the engine forwards each request once
//! - Circuit breaker prevents cascading failures

pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::{
    BreakerRegistry, BreakerSnapshot, BreakerState, BreakerStats, CallOutcome, CallPermit,
    CircuitBreaker, CircuitBreakerSettings,
};
