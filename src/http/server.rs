//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all gateway handler
//! - Wire up middleware (tracing, limits, request ID, timeout)
//! - Mount the admin API when enabled
//! - Bind server to listener and apply configuration updates
//! - Convert between axum and gateway request/response types

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderName, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::{ConfigError, GatewayConfig};
use crate::gateway::{Gateway, GatewayRequest, GatewayResponse};
use crate::proxy::HttpForwarder;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway<HttpForwarder>>,
    pub admin_api_key: Arc<str>,
    pub max_body_bytes: usize,
    pub started_at: Instant,
}

/// HTTP front end for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Build the engine and the router. Fails on an invalid configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        let forwarder = HttpForwarder::new(&config.timeouts);
        let gateway = Arc::new(Gateway::new(&config, forwarder)?);

        let state = AppState {
            gateway,
            admin_api_key: Arc::from(config.admin.api_key.as_str()),
            max_body_bytes: config.timeouts.max_body_bytes,
            started_at: Instant::now(),
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        let mut router = Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler));
        if config.admin.enabled {
            if config.admin.api_key.is_empty() {
                tracing::warn!("Admin API enabled without an api_key, not mounting it");
            } else {
                router = router.merge(admin::router(state.clone()));
            }
        }

        router.with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(RequestBodyLimitLayer::new(config.timeouts.max_body_bytes))
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// Serve until `shutdown` fires. Valid configs received on `config_updates`
    /// replace the route table without dropping connections.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.state.gateway.routes().len(),
            "HTTP server starting"
        );

        let gateway = Arc::clone(&self.state.gateway);
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                if let Err(err) = gateway.reload(&config) {
                    tracing::error!(error = %err, "Rejected configuration update");
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: buffer the request, run the engine on its own task.
async fn gateway_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read request body");
            return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
        }
    };

    let request = GatewayRequest {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
        client_addr: Some(addr),
    };

    // Dropping this handler (client gone) cancels the in-flight exchange.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let gateway = Arc::clone(&state.gateway);
    match tokio::spawn(async move { gateway.handle(request, cancel).await }).await {
        Ok(response) => response.into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Exchange task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal gateway error").into_response()
        }
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use axum::http::header;
    use tower::ServiceExt;

    use super::*;

    fn request(path: &str, body: &'static str) -> Request<Body> {
        let mut request = Request::get(path)
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
        request
    }

    fn server(config: GatewayConfig) -> HttpServer {
        HttpServer::new(config).unwrap()
    }

    #[tokio::test]
    async fn middleware_stack_serves_local_endpoints() {
        let server = server(GatewayConfig::default());
        let response = server.router.oneshot(request("/fallback", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(body, "fallback");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mut config = GatewayConfig::default();
        config.timeouts.max_body_bytes = 4;
        let response = server(config)
            .router
            .oneshot(request("/fallback", "too large"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn admin_api_needs_a_key_to_be_mounted() {
        let mut config = GatewayConfig::default();
        config.admin.enabled = true;
        let response = server(config.clone())
            .router
            .oneshot(request("/admin/status", ""))
            .await
            .unwrap();
        // Falls through to the gateway, which has no route for it.
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        config.admin.api_key = "secret".into();
        let response = server(config).router.oneshot(request("/admin/status", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
