//! HTTP client used to reach upstream targets.

use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{PathAndQuery, Scheme};
use axum::http::{Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio_util::sync::CancellationToken;

use crate::config::TimeoutConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{GatewayRequest, GatewayResponse};
use crate::proxy::headers;
use crate::proxy::Forwarder;
use crate::resilience::timeouts::with_deadline;

/// Pooled hyper client with connect and response deadlines.
#[derive(Clone)]
pub struct HttpForwarder {
    client: Client<HttpConnector, Body>,
    upstream_timeout: Duration,
    max_body_bytes: usize,
}

impl HttpForwarder {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(timeouts.connect_ms)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            upstream_timeout: Duration::from_millis(timeouts.upstream_ms),
            max_body_bytes: timeouts.max_body_bytes,
        }
    }

    async fn send(&self, request: GatewayRequest, target: &Uri, label: &str) -> GatewayResult<GatewayResponse> {
        let outbound = build_upstream_request(request, target, label)?;

        let response = self.client.request(outbound).await.map_err(|e| {
            if e.is_connect() {
                GatewayError::UpstreamUnreachable {
                    target: label.to_string(),
                    message: e.to_string(),
                }
            } else {
                GatewayError::UpstreamProtocol {
                    target: label.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let (mut parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), self.max_body_bytes)
            .await
            .map_err(|e| GatewayError::UpstreamProtocol {
                target: label.to_string(),
                message: format!("reading response body: {}", e),
            })?;
        headers::strip_hop_by_hop(&mut parts.headers);

        Ok(GatewayResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

impl Forwarder for HttpForwarder {
    fn forward(
        &self,
        request: GatewayRequest,
        target: &Uri,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = GatewayResult<GatewayResponse>> + Send {
        async move {
            let label = target.to_string();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(GatewayError::Cancelled { target: label }),
                result = with_deadline(self.upstream_timeout, &label, self.send(request, target, &label)) => result,
            }
        }
    }
}

/// Rewrite scheme and authority to the target, keeping path and query.
fn build_upstream_request(request: GatewayRequest, target: &Uri, label: &str) -> GatewayResult<Request<Body>> {
    let protocol = |message: String| GatewayError::UpstreamProtocol {
        target: label.to_string(),
        message,
    };

    let authority = target
        .authority()
        .cloned()
        .ok_or_else(|| protocol("target has no authority".into()))?;
    let path_and_query = request
        .uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));
    let uri = Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(authority.clone())
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| protocol(e.to_string()))?;

    let GatewayRequest {
        method,
        mut headers,
        body,
        client_addr,
        ..
    } = request;
    headers::prepare_upstream(&mut headers, client_addr, &authority);

    let mut outbound = Request::new(Body::from(body));
    *outbound.method_mut() = method;
    *outbound.uri_mut() = uri;
    *outbound.headers_mut() = headers;
    Ok(outbound)
}
