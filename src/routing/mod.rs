//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path, method, headers, query)
//!     → router.rs (ordered route scan)
//!     → matcher.rs (evaluate predicate tree)
//!     → Return: matched Route or RouteNotFound
//!
//! Route Compilation (at startup and on reload):
//!     RouteConfig[]
//!     → Compile predicates, filters and target URIs
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled up front, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route
//! - First match wins (declared order)

pub mod matcher;
pub mod router;

pub use matcher::{HostPattern, PathPattern, Predicate};
pub use router::{Route, RouteTable};
