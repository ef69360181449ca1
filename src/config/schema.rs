//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Route definitions, evaluated in declared order.
    pub routes: Vec<RouteConfig>,

    /// In-process endpoints (fallback targets).
    pub endpoints: Vec<EndpointConfig>,

    /// Timeout and size limits.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            routes: Vec::new(),
            endpoints: vec![EndpointConfig::fallback()],
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// A route: one predicate, an ordered filter chain and a target URI.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Unique route identifier for logging/metrics.
    pub id: String,

    /// Target URI (scheme + authority), e.g. "http://httpbin.org:80".
    pub uri: String,

    /// Match conditions. An empty predicate matches every request.
    #[serde(default)]
    pub predicate: PredicateConfig,

    /// Filters applied in declared order.
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

/// Predicate tree. All populated fields are combined with AND.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PredicateConfig {
    /// Path pattern: exact ("/get"), one segment ("/users/*") or subtree ("/api/**").
    pub path: Option<String>,

    /// Host pattern, e.g. "*.hystrix.com".
    pub host: Option<String>,

    /// HTTP method, e.g. "GET".
    pub method: Option<String>,

    /// Header that must be present (optionally with an exact value).
    pub header: Option<KeyValueMatch>,

    /// Query parameter that must be present (optionally with an exact value).
    pub query: Option<KeyValueMatch>,

    /// Every nested predicate must match.
    pub all: Vec<PredicateConfig>,

    /// At least one nested predicate must match.
    pub any: Vec<PredicateConfig>,

    /// Nested predicate that must not match.
    pub not: Option<Box<PredicateConfig>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeyValueMatch {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// Filter declaration, tagged by `type`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterConfig {
    AddRequestHeader { name: String, value: String },
    RemoveRequestHeader { name: String },
    AddResponseHeader { name: String, value: String },
    StripPrefix { parts: usize },
    PrefixPath { prefix: String },
    RedirectTo { status: u16, location: String },
    CircuitBreaker(CircuitBreakerConfig),
}

impl FilterConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            FilterConfig::AddRequestHeader { .. } => "add_request_header",
            FilterConfig::RemoveRequestHeader { .. } => "remove_request_header",
            FilterConfig::AddResponseHeader { .. } => "add_response_header",
            FilterConfig::StripPrefix { .. } => "strip_prefix",
            FilterConfig::PrefixPath { .. } => "prefix_path",
            FilterConfig::RedirectTo { .. } => "redirect_to",
            FilterConfig::CircuitBreaker(_) => "circuit_breaker",
        }
    }
}

/// Circuit breaker filter parameters. Durations are in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CircuitBreakerConfig {
    /// Breaker name. Routes sharing a name share breaker state.
    pub name: String,

    /// Failure ratio (0..1] over the window that opens the breaker.
    #[serde(default = "default_failure_threshold", alias = "failureThreshold")]
    pub failure_threshold: f64,

    /// Number of most recent calls kept in the rolling window.
    #[serde(default = "default_window_size", alias = "windowSize")]
    pub window_size: usize,

    /// Calls required in the window before the ratio is evaluated.
    /// Defaults to `window_size`.
    #[serde(default, alias = "minimumCalls")]
    pub minimum_calls: Option<usize>,

    /// Time spent open before a probe is let through.
    #[serde(default = "default_cooldown_ms", alias = "cooldown")]
    pub cooldown_ms: u64,

    /// Deadline for one upstream call through this breaker.
    #[serde(default = "default_call_timeout_ms", alias = "callTimeout")]
    pub call_timeout_ms: u64,

    /// Local endpoint served when the breaker is open or the call fails.
    #[serde(alias = "fallbackPath")]
    pub fallback_path: String,
}

fn default_failure_threshold() -> f64 {
    0.5
}

fn default_window_size() -> usize {
    20
}

fn default_cooldown_ms() -> u64 {
    5_000
}

fn default_call_timeout_ms() -> u64 {
    1_000
}

impl CircuitBreakerConfig {
    pub fn new(name: impl Into<String>, fallback_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_threshold: default_failure_threshold(),
            window_size: default_window_size(),
            minimum_calls: None,
            cooldown_ms: default_cooldown_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            fallback_path: fallback_path.into(),
        }
    }
}

/// A fixed response served in process.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    pub path: String,

    #[serde(default = "default_endpoint_status")]
    pub status: u16,

    #[serde(default)]
    pub body: String,

    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_endpoint_status() -> u16 {
    200
}

fn default_content_type() -> String {
    "text/plain;charset=UTF-8".to_string()
}

impl EndpointConfig {
    /// The `/fallback` endpoint answering `fallback`.
    pub fn fallback() -> Self {
        Self {
            path: "/fallback".to_string(),
            status: default_endpoint_status(),
            body: "fallback".to_string(),
            content_type: default_content_type(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Transport-level upstream response timeout in milliseconds.
    pub upstream_ms: u64,

    /// Total inbound request timeout in seconds.
    pub request_secs: u64,

    /// Maximum buffered body size (request and response) in bytes.
    pub max_body_bytes: usize,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 5_000,
            upstream_ms: 30_000,
            request_secs: 60,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    pub log_level: String,

    /// "pretty" or "json".
    pub log_format: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the admin API on the main listener. Ignored without an `api_key`.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
        }
    }
}
