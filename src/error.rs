//! Gateway error taxonomy.
//!
//! # Propagation
//! ```text
//! routing      → RouteNotFound            → 404, never retried
//! filters      → Filter                   → 500
//! forwarding   → Upstream* / Cancelled    → caught by the circuit breaker when the
//!                                           route has one, otherwise 500
//! breaker      → BreakerOpen              → never surfaced, always a fallback
//! ```

use axum::http::StatusCode;
use thiserror::Error;

/// Errors produced while handling a single exchange.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("no route matched {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("upstream {target} unreachable: {message}")]
    UpstreamUnreachable { target: String, message: String },

    #[error("upstream {target} timed out after {timeout_ms}ms")]
    UpstreamTimeout { target: String, timeout_ms: u64 },

    #[error("upstream {target} protocol error: {message}")]
    UpstreamProtocol { target: String, message: String },

    #[error("request cancelled before upstream {target} responded")]
    Cancelled { target: String },

    #[error("filter {filter} failed: {message}")]
    Filter { filter: &'static str, message: String },

    #[error("circuit breaker {name} is open")]
    BreakerOpen { name: String },

    #[error("fallback endpoint {path} is not registered")]
    FallbackNotFound { path: String },
}

impl GatewayError {
    pub fn filter(filter: &'static str, message: impl Into<String>) -> Self {
        GatewayError::Filter {
            filter,
            message: message.into(),
        }
    }

    /// Status code served to the client when this error is not absorbed by a fallback.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for failures of the outbound call itself. Only these count against a breaker.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            GatewayError::UpstreamUnreachable { .. }
                | GatewayError::UpstreamTimeout { .. }
                | GatewayError::UpstreamProtocol { .. }
                | GatewayError::Cancelled { .. }
        )
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::RouteNotFound { .. } => "route_not_found",
            GatewayError::UpstreamUnreachable { .. } => "upstream_unreachable",
            GatewayError::UpstreamTimeout { .. } => "upstream_timeout",
            GatewayError::UpstreamProtocol { .. } => "upstream_protocol",
            GatewayError::Cancelled { .. } => "cancelled",
            GatewayError::Filter { .. } => "filter",
            GatewayError::BreakerOpen { .. } => "breaker_open",
            GatewayError::FallbackNotFound { .. } => "fallback_not_found",
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
