//! Route Gateway library: predicate routing, filter chains and circuit
//! breaking in front of HTTP upstreams.

pub mod admin;
pub mod config;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod resilience;
pub mod routing;

pub use config::schema::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use gateway::{Gateway, GatewayRequest, GatewayResponse};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
