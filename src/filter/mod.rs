//! Filter chain subsystem.
//!
//! # Data Flow
//! ```text
//! Matched route + request
//!     → request phase: filters in declared order
//!         header / path mutators edit the request
//!         redirect_to short-circuits with a response
//!         circuit_breaker snapshots the request for its fallback
//!     → [forward, through the breaker if declared]
//!     → response phase: filters in reverse declared order
//! ```
//!
//! # Design Decisions
//! - Filters are a closed set of variants assembled at load time
//! - Filters only touch the request/response handed to them
//! - The breaker's shared state lives in the registry, not in the filter

pub mod circuit_breaker;
pub mod headers;
pub mod path;

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, StatusCode};

use crate::config::FilterConfig;
use crate::error::GatewayResult;
use crate::gateway::{GatewayRequest, GatewayResponse};
use crate::resilience::CircuitBreakerSettings;

/// One step of a route's filter chain.
#[derive(Debug, Clone)]
pub enum Filter {
    AddRequestHeader { name: HeaderName, value: HeaderValue },
    RemoveRequestHeader { name: HeaderName },
    AddResponseHeader { name: HeaderName, value: HeaderValue },
    StripPrefix { parts: usize },
    PrefixPath { prefix: String },
    RedirectTo { status: StatusCode, location: HeaderValue },
    CircuitBreaker(Arc<CircuitBreakerSettings>),
}

/// What a request-phase filter decided.
#[derive(Debug)]
pub enum FilterOutcome {
    Continue,
    Respond(GatewayResponse),
}

impl Filter {
    pub fn from_config(config: &FilterConfig) -> Result<Self, String> {
        Ok(match config {
            FilterConfig::AddRequestHeader { name, value } => {
                let (name, value) = headers::parse_pair(name, value)?;
                Filter::AddRequestHeader { name, value }
            }
            FilterConfig::RemoveRequestHeader { name } => Filter::RemoveRequestHeader {
                name: headers::parse_name(name)?,
            },
            FilterConfig::AddResponseHeader { name, value } => {
                let (name, value) = headers::parse_pair(name, value)?;
                Filter::AddResponseHeader { name, value }
            }
            FilterConfig::StripPrefix { parts } => {
                if *parts == 0 {
                    return Err("parts must be at least 1".into());
                }
                Filter::StripPrefix { parts: *parts }
            }
            FilterConfig::PrefixPath { prefix } => {
                if !prefix.starts_with('/') || prefix.ends_with('/') {
                    return Err(format!("prefix '{}' must start and not end with '/'", prefix));
                }
                Filter::PrefixPath {
                    prefix: prefix.clone(),
                }
            }
            FilterConfig::RedirectTo { status, location } => {
                let status = StatusCode::from_u16(*status).map_err(|_| format!("invalid status {}", status))?;
                if !status.is_redirection() {
                    return Err(format!("status {} is not a redirect", status.as_u16()));
                }
                let location = HeaderValue::from_str(location)
                    .map_err(|_| format!("invalid location '{}'", location))?;
                Filter::RedirectTo { status, location }
            }
            FilterConfig::CircuitBreaker(cb) => {
                Filter::CircuitBreaker(Arc::new(CircuitBreakerSettings::try_from(cb)?))
            }
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Filter::AddRequestHeader { .. } => "add_request_header",
            Filter::RemoveRequestHeader { .. } => "remove_request_header",
            Filter::AddResponseHeader { .. } => "add_response_header",
            Filter::StripPrefix { .. } => "strip_prefix",
            Filter::PrefixPath { .. } => "prefix_path",
            Filter::RedirectTo { .. } => "redirect_to",
            Filter::CircuitBreaker(_) => "circuit_breaker",
        }
    }

    /// Request phase. Response-only filters and the breaker marker pass through.
    pub fn apply(&self, req: &mut GatewayRequest) -> GatewayResult<FilterOutcome> {
        match self {
            Filter::AddRequestHeader { name, value } => headers::append(&mut req.headers, name, value),
            Filter::RemoveRequestHeader { name } => headers::remove(&mut req.headers, name),
            Filter::StripPrefix { parts } => path::strip_prefix(req, *parts)?,
            Filter::PrefixPath { prefix } => path::prefix_path(req, prefix)?,
            Filter::RedirectTo { status, location } => {
                let mut response = GatewayResponse::new(*status);
                response.headers.insert(header::LOCATION, location.clone());
                return Ok(FilterOutcome::Respond(response));
            }
            Filter::AddResponseHeader { .. } | Filter::CircuitBreaker(_) => {}
        }
        Ok(FilterOutcome::Continue)
    }

    /// Response phase.
    pub fn apply_response(&self, resp: &mut GatewayResponse) {
        if let Filter::AddResponseHeader { name, value } = self {
            headers::append(&mut resp.headers, name, value);
        }
    }
}

/// The breaker step captured while running the request phase.
#[derive(Debug)]
pub struct BreakerStep {
    pub settings: Arc<CircuitBreakerSettings>,
    /// The request as mutated by the filters declared before the breaker.
    pub fallback_request: GatewayRequest,
}

/// Result of the request phase.
#[derive(Debug)]
pub enum RequestPhase {
    /// A filter produced the response; nothing is forwarded.
    Respond(GatewayResponse),
    /// Forward `request`, through `breaker` when the route declares one.
    Forward {
        request: GatewayRequest,
        breaker: Option<BreakerStep>,
    },
}

/// Ordered filters of one route.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Breaker settings when the chain declares a circuit breaker.
    pub fn breaker(&self) -> Option<&Arc<CircuitBreakerSettings>> {
        self.filters.iter().find_map(|f| match f {
            Filter::CircuitBreaker(settings) => Some(settings),
            _ => None,
        })
    }

    /// Run the request phase in declared order.
    pub fn apply_request(&self, mut request: GatewayRequest) -> GatewayResult<RequestPhase> {
        let mut breaker = None;
        for filter in &self.filters {
            if let Filter::CircuitBreaker(settings) = filter {
                breaker = Some(BreakerStep {
                    settings: Arc::clone(settings),
                    fallback_request: request.clone(),
                });
                continue;
            }
            match filter.apply(&mut request)? {
                FilterOutcome::Continue => {}
                FilterOutcome::Respond(response) => {
                    tracing::debug!(filter = filter.name(), status = %response.status, "Filter short-circuited");
                    return Ok(RequestPhase::Respond(response));
                }
            }
        }
        Ok(RequestPhase::Forward { request, breaker })
    }

    /// Run the response phase in reverse declared order.
    pub fn apply_response(&self, response: &mut GatewayResponse) {
        for filter in self.filters.iter().rev() {
            filter.apply_response(response);
        }
    }
}
