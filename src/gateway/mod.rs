//! Gateway engine subsystem.
//!
//! # Data Flow
//! ```text
//! GatewayRequest (from the HTTP layer)
//!     → endpoints.rs (local endpoint? respond in process)
//!     → engine.rs
//!         → routing (first matching route)
//!         → filter chain (request phase)
//!         → proxy / circuit breaker (forward or fallback)
//!         → filter chain (response phase)
//!     → GatewayResponse (back to the HTTP layer)
//! ```

pub mod endpoints;
pub mod engine;
pub mod exchange;

pub use endpoints::LocalEndpoints;
pub use engine::Gateway;
pub use exchange::{GatewayRequest, GatewayResponse};
