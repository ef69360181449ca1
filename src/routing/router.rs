//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes in declared order
//! - Look up the first matching route for a request
//! - Return matched route or explicit RouteNotFound
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in declared order, first match wins
//! - Explicit RouteNotFound rather than silent default

use std::sync::Arc;

use axum::http::Uri;

use crate::config::validation::{check_target, ValidationError};
use crate::config::RouteConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::filter::{Filter, FilterChain};
use crate::gateway::GatewayRequest;
use crate::routing::matcher::Predicate;

/// A compiled route: one predicate tree, an ordered filter chain and a target.
#[derive(Debug)]
pub struct Route {
    pub id: String,
    pub predicate: Predicate,
    pub filters: FilterChain,
    pub uri: Uri,
}

impl Route {
    pub fn from_config(config: &RouteConfig) -> Result<Self, ValidationError> {
        let uri = check_target(&config.uri).map_err(|reason| ValidationError::InvalidTarget {
            route: config.id.clone(),
            uri: config.uri.clone(),
            reason,
        })?;

        let predicate =
            Predicate::compile(&config.predicate).map_err(|reason| ValidationError::InvalidPredicate {
                route: config.id.clone(),
                reason,
            })?;

        let filters = config
            .filters
            .iter()
            .map(|filter| {
                Filter::from_config(filter).map_err(|reason| ValidationError::InvalidFilter {
                    route: config.id.clone(),
                    filter: filter.kind(),
                    reason,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: config.id.clone(),
            predicate,
            filters: FilterChain::new(filters),
            uri,
        })
    }
}

/// Ordered, immutable collection of routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            routes: routes.into_iter().map(Arc::new).collect(),
        }
    }

    /// Compile every route, failing on the first invalid one.
    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, ValidationError> {
        let routes = configs
            .iter()
            .map(Route::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(routes))
    }

    /// First route whose predicate matches, in declared order.
    pub fn match_request(&self, req: &GatewayRequest) -> GatewayResult<Arc<Route>> {
        self.routes
            .iter()
            .find(|route| route.predicate.matches(req))
            .cloned()
            .ok_or_else(|| GatewayError::RouteNotFound {
                method: req.method.to_string(),
                path: req.path().to_string(),
            })
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CircuitBreakerConfig, FilterConfig, PredicateConfig};

    fn reference_table() -> RouteTable {
        RouteTable::from_config(&[
            RouteConfig {
                id: "path_route".into(),
                uri: "http://httpbin.org:80".into(),
                predicate: PredicateConfig {
                    path: Some("/get".into()),
                    ..Default::default()
                },
                filters: vec![FilterConfig::AddRequestHeader {
                    name: "hello".into(),
                    value: "world".into(),
                }],
            },
            RouteConfig {
                id: "hystrix_route".into(),
                uri: "http://httpbin.org:80".into(),
                predicate: PredicateConfig {
                    host: Some("*.hystrix.com".into()),
                    ..Default::default()
                },
                filters: vec![FilterConfig::CircuitBreaker(CircuitBreakerConfig::new(
                    "mycmd",
                    "/fallback",
                ))],
            },
        ])
        .unwrap()
    }

    #[test]
    fn first_match_wins() {
        let table = reference_table();

        let req = GatewayRequest::get("/get").with_header("host", "www.baidu.com");
        assert_eq!(table.match_request(&req).unwrap().id, "path_route");

        // Matches both predicates; the earlier route is chosen.
        let req = GatewayRequest::get("/get").with_header("host", "www.hystrix.com");
        assert_eq!(table.match_request(&req).unwrap().id, "path_route");

        let req = GatewayRequest::get("/delay/3").with_header("host", "www.hystrix.com");
        assert_eq!(table.match_request(&req).unwrap().id, "hystrix_route");
    }

    #[test]
    fn no_match_is_route_not_found() {
        let table = reference_table();
        let req = GatewayRequest::get("/status/418").with_header("host", "www.baidu.com");
        let err = table.match_request(&req).unwrap_err();
        assert!(matches!(err, GatewayError::RouteNotFound { ref path, .. } if path == "/status/418"));
    }

    #[test]
    fn routing_is_deterministic() {
        let table = reference_table();
        let req = GatewayRequest::get("/delay/3").with_header("host", "api.hystrix.com");
        let first = table.match_request(&req).unwrap();
        for _ in 0..100 {
            assert!(Arc::ptr_eq(&first, &table.match_request(&req).unwrap()));
        }
    }

    #[test]
    fn invalid_route_is_rejected() {
        let err = RouteTable::from_config(&[RouteConfig {
            id: "bad".into(),
            uri: "httpbin.org".into(),
            predicate: PredicateConfig::default(),
            filters: vec![],
        }])
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTarget { .. }));
    }
}
