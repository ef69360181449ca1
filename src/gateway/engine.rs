//! Per-exchange orchestration.
//!
//! # Responsibilities
//! - Serve local endpoints before any route is considered
//! - Match the route table snapshot, run filters, forward, run response filters
//! - Route breaker-guarded calls through the shared breaker registry
//! - Turn every error into a concrete response
//!
//! # Design Decisions
//! - The route table and endpoints live behind `ArcSwap`; reload is one atomic store
//! - Breakers are keyed by name and survive reloads
//! - No retries: each request is forwarded at most once

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::validation::validate_config;
use crate::config::{ConfigError, GatewayConfig};
use crate::error::GatewayResult;
use crate::filter::{circuit_breaker, RequestPhase};
use crate::gateway::{GatewayRequest, GatewayResponse, LocalEndpoints};
use crate::observability::metrics;
use crate::proxy::Forwarder;
use crate::resilience::BreakerRegistry;
use crate::routing::{Route, RouteTable};

/// The routing engine, generic over the upstream client.
pub struct Gateway<F> {
    routes: ArcSwap<RouteTable>,
    endpoints: ArcSwap<LocalEndpoints>,
    breakers: BreakerRegistry,
    forwarder: F,
}

impl<F: Forwarder> Gateway<F> {
    pub fn new(config: &GatewayConfig, forwarder: F) -> Result<Self, ConfigError> {
        let (routes, endpoints) = compile(config)?;
        let gateway = Self {
            routes: ArcSwap::from_pointee(routes),
            endpoints: ArcSwap::from_pointee(endpoints),
            breakers: BreakerRegistry::new(),
            forwarder,
        };
        gateway.register_breakers();
        Ok(gateway)
    }

    /// Swap in a new route table and endpoint set. In-flight exchanges keep
    /// the snapshot they started with.
    pub fn reload(&self, config: &GatewayConfig) -> Result<(), ConfigError> {
        let (routes, endpoints) = compile(config)?;
        let count = routes.len();
        self.routes.store(Arc::new(routes));
        self.endpoints.store(Arc::new(endpoints));
        self.register_breakers();
        tracing::info!(routes = count, "Route table reloaded");
        Ok(())
    }

    pub fn routes(&self) -> Arc<RouteTable> {
        self.routes.load_full()
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    pub fn forwarder(&self) -> &F {
        &self.forwarder
    }

    /// Handle one exchange. Never fails: errors become responses.
    pub async fn handle(&self, request: GatewayRequest, cancel: CancellationToken) -> GatewayResponse {
        let start = Instant::now();

        let endpoints = self.endpoints.load_full();
        if let Some(response) = endpoints.serve(request.path()) {
            metrics::record_request("local", response.status.as_u16(), start);
            return response;
        }

        let routes = self.routes.load_full();
        let (route_id, result) = match routes.match_request(&request) {
            Ok(route) => {
                let span = tracing::debug_span!("route", id = %route.id);
                let result = self
                    .dispatch(&route, request, &endpoints, &cancel)
                    .instrument(span)
                    .await;
                (route.id.clone(), result)
            }
            Err(err) => ("none".to_string(), Err(err)),
        };

        let response = result.unwrap_or_else(|err| {
            if err.status_code().is_server_error() {
                tracing::error!(route = %route_id, error = %err, "Exchange failed");
            } else {
                tracing::debug!(error = %err, "Exchange rejected");
            }
            metrics::record_error(err.kind());
            GatewayResponse::from_error(&err)
        });

        metrics::record_request(&route_id, response.status.as_u16(), start);
        response
    }

    async fn dispatch(
        &self,
        route: &Route,
        request: GatewayRequest,
        endpoints: &LocalEndpoints,
        cancel: &CancellationToken,
    ) -> GatewayResult<GatewayResponse> {
        let mut response = match route.filters.apply_request(request)? {
            RequestPhase::Respond(response) => response,
            RequestPhase::Forward { request, breaker } => {
                tracing::debug!(method = %request.method, uri = %request.uri, target = %route.uri, "Forwarding");
                let call = async { self.forwarder.forward(request, &route.uri, cancel).await };
                match breaker {
                    Some(step) => {
                        let breaker = self.breakers.get_or_create(&step.settings);
                        circuit_breaker::execute(&breaker, step, endpoints, &route.uri.to_string(), call).await?
                    }
                    None => call.await?,
                }
            }
        };
        route.filters.apply_response(&mut response);
        Ok(response)
    }

    fn register_breakers(&self) {
        for route in self.routes.load().routes() {
            if let Some(settings) = route.filters.breaker() {
                let breaker = self.breakers.get_or_create(settings);
                if breaker.settings() != settings.as_ref() {
                    tracing::warn!(
                        breaker = %settings.name,
                        route = %route.id,
                        "Breaker already exists with different settings; keeping the original"
                    );
                }
            }
        }
    }
}

fn compile(config: &GatewayConfig) -> Result<(RouteTable, LocalEndpoints), ConfigError> {
    validate_config(config).map_err(ConfigError::Validation)?;
    let routes = RouteTable::from_config(&config.routes).map_err(|e| ConfigError::Validation(vec![e]))?;
    Ok((routes, LocalEndpoints::from_config(&config.endpoints)))
}
