//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (fallback paths reference local endpoints)
//! - Validate value ranges (thresholds, window sizes, timeouts)
//! - Detect duplicate route ids and endpoint paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use axum::http::{HeaderValue, StatusCode, Uri};
use thiserror::Error;

use crate::config::schema::{EndpointConfig, FilterConfig, GatewayConfig, RouteConfig};
use crate::filter::Filter;
use crate::routing::Predicate;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("route #{index} has an empty id")]
    EmptyRouteId { index: usize },

    #[error("duplicate route id '{0}'")]
    DuplicateRouteId(String),

    #[error("route '{route}': invalid target uri '{uri}': {reason}")]
    InvalidTarget { route: String, uri: String, reason: String },

    #[error("route '{route}': invalid predicate: {reason}")]
    InvalidPredicate { route: String, reason: String },

    #[error("route '{route}': invalid {filter} filter: {reason}")]
    InvalidFilter {
        route: String,
        filter: &'static str,
        reason: String,
    },

    #[error("route '{route}' declares more than one circuit_breaker filter")]
    MultipleBreakers { route: String },

    #[error("route '{route}': fallback path '{path}' is not a configured endpoint")]
    UnknownFallback { route: String, path: String },

    #[error("endpoint '{path}': {reason}")]
    InvalidEndpoint { path: String, reason: String },

    #[error("duplicate endpoint path '{0}'")]
    DuplicateEndpoint(String),
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut endpoint_paths = HashSet::new();
    for endpoint in &config.endpoints {
        validate_endpoint(endpoint, &mut errors);
        if !endpoint_paths.insert(endpoint.path.as_str()) {
            errors.push(ValidationError::DuplicateEndpoint(endpoint.path.clone()));
        }
    }

    let mut route_ids = HashSet::new();
    for (index, route) in config.routes.iter().enumerate() {
        if route.id.trim().is_empty() {
            errors.push(ValidationError::EmptyRouteId { index });
        } else if !route_ids.insert(route.id.as_str()) {
            errors.push(ValidationError::DuplicateRouteId(route.id.clone()));
        }
        validate_route(route, &endpoint_paths, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_endpoint(endpoint: &EndpointConfig, errors: &mut Vec<ValidationError>) {
    if !endpoint.path.starts_with('/') {
        errors.push(ValidationError::InvalidEndpoint {
            path: endpoint.path.clone(),
            reason: "path must start with '/'".into(),
        });
    }
    if StatusCode::from_u16(endpoint.status).is_err() {
        errors.push(ValidationError::InvalidEndpoint {
            path: endpoint.path.clone(),
            reason: format!("invalid status {}", endpoint.status),
        });
    }
    if HeaderValue::from_str(&endpoint.content_type).is_err() {
        errors.push(ValidationError::InvalidEndpoint {
            path: endpoint.path.clone(),
            reason: format!("invalid content type '{}'", endpoint.content_type),
        });
    }
}

fn validate_route(
    route: &RouteConfig,
    endpoint_paths: &HashSet<&str>,
    errors: &mut Vec<ValidationError>,
) {
    if let Err(reason) = check_target(&route.uri) {
        errors.push(ValidationError::InvalidTarget {
            route: route.id.clone(),
            uri: route.uri.clone(),
            reason,
        });
    }

    if let Err(reason) = Predicate::compile(&route.predicate) {
        errors.push(ValidationError::InvalidPredicate {
            route: route.id.clone(),
            reason,
        });
    }

    let mut breakers = 0;
    for filter in &route.filters {
        if let FilterConfig::CircuitBreaker(cb) = filter {
            breakers += 1;
            if !endpoint_paths.contains(cb.fallback_path.as_str()) {
                errors.push(ValidationError::UnknownFallback {
                    route: route.id.clone(),
                    path: cb.fallback_path.clone(),
                });
            }
        }
        if let Err(reason) = Filter::from_config(filter) {
            errors.push(ValidationError::InvalidFilter {
                route: route.id.clone(),
                filter: filter.kind(),
                reason,
            });
        }
    }
    if breakers > 1 {
        errors.push(ValidationError::MultipleBreakers {
            route: route.id.clone(),
        });
    }
}

/// Target must be an absolute http URI without a path.
pub(crate) fn check_target(uri: &str) -> Result<Uri, String> {
    let parsed: Uri = uri.parse().map_err(|e| format!("{}", e))?;
    match parsed.scheme_str() {
        Some("http") => {}
        Some("https") => return Err("TLS upstreams are not supported".into()),
        Some(other) => return Err(format!("unsupported scheme '{}'", other)),
        None => return Err("missing scheme".into()),
    }
    if parsed.authority().is_none() {
        return Err("missing authority".into());
    }
    if !matches!(parsed.path(), "" | "/") || parsed.query().is_some() {
        return Err("target must not carry a path or query".into());
    }
    Ok(parsed)
}
