//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Filtered GatewayRequest + route target
//!     → headers.rs (hop-by-hop strip, X-Forwarded-*, Host)
//!     → client.rs (absolute URI, send, buffer response)
//!     → GatewayResponse back to the engine
//! ```
//!
//! # Design Decisions
//! - The engine is generic over `Forwarder`, so tests can script upstreams
//! - Cancellation is cooperative through a token owned by the connection

pub mod client;
pub mod headers;

use std::future::Future;

use axum::http::Uri;
use tokio_util::sync::CancellationToken;

use crate::error::GatewayResult;
use crate::gateway::{GatewayRequest, GatewayResponse};

pub use client::HttpForwarder;

/// Sends one request to an upstream target and returns its response.
///
/// Any upstream status, including 5xx, is a successful forward. Errors are
/// reserved for transport failures, timeouts and cancellation.
pub trait Forwarder: Send + Sync + 'static {
    fn forward(
        &self,
        request: GatewayRequest,
        target: &Uri,
        cancel: &CancellationToken,
    ) -> impl Future<Output = GatewayResult<GatewayResponse>> + Send;
}
