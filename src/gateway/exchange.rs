//! Request and response values passed explicitly through every stage.

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};

use crate::error::{GatewayError, GatewayResult};

/// An inbound request as seen by the engine. Bodies are fully buffered.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: Method,
    /// Origin-form URI (path and query).
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_addr: Option<SocketAddr>,
}

impl GatewayRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            client_addr: None,
        }
    }

    /// Shorthand for tests and internal forwards. Panics on an invalid URI literal.
    pub fn get(uri: &'static str) -> Self {
        Self::new(Method::GET, Uri::from_static(uri))
    }

    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers
            .append(HeaderName::from_static(name), HeaderValue::from_static(value));
        self
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Host without port, from the Host header or the URI authority.
    pub fn host(&self) -> Option<&str> {
        let raw = self
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| self.uri.host())?;
        Some(strip_port(raw))
    }

    /// First value of a query parameter, undecoded. A bare key yields "".
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.uri.query()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then_some(value)
        })
    }

    /// Replace the path, keeping the query string.
    pub fn set_path(&mut self, path: &str, filter: &'static str) -> GatewayResult<()> {
        let path_and_query = match self.uri.query() {
            Some(query) => format!("{}?{}", path, query),
            None => path.to_string(),
        };
        self.uri = path_and_query
            .parse()
            .map_err(|e| GatewayError::filter(filter, format!("invalid path '{}': {}", path, e)))?;
        Ok(())
    }
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// A response produced by the upstream, a local endpoint or the engine itself.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl GatewayResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let mut response = Self::new(status);
        response.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain;charset=UTF-8"),
        );
        response.body = body.into();
        response
    }

    /// Client-facing response for `err`. The body carries only the status
    /// reason; details stay in the logs.
    pub fn from_error(err: &GatewayError) -> Self {
        let status = err.status_code();
        Self::text(status, status.canonical_reason().unwrap_or("Error"))
    }
}
