//! Fixed responses served in process, such as the `/fallback` endpoint.

use std::collections::HashMap;

use axum::http::{header, HeaderValue, StatusCode};

use crate::config::EndpointConfig;
use crate::gateway::GatewayResponse;

#[derive(Debug, Clone, Default)]
pub struct LocalEndpoints {
    responses: HashMap<String, GatewayResponse>,
}

impl LocalEndpoints {
    /// Build from validated config. Entries with an invalid status or
    /// content type are skipped with a warning.
    pub fn from_config(configs: &[EndpointConfig]) -> Self {
        let mut responses = HashMap::new();
        for config in configs {
            let (Ok(status), Ok(content_type)) = (
                StatusCode::from_u16(config.status),
                HeaderValue::from_str(&config.content_type),
            ) else {
                tracing::warn!(path = %config.path, "Skipping malformed local endpoint");
                continue;
            };
            let mut response = GatewayResponse::new(status);
            response.headers.insert(header::CONTENT_TYPE, content_type);
            response.body = config.body.clone().into();
            responses.insert(config.path.clone(), response);
        }
        Self { responses }
    }

    /// The response for `path`, if one is registered.
    pub fn serve(&self, path: &str) -> Option<GatewayResponse> {
        self.responses.get(path).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serves_fallback_body() {
        let endpoints = LocalEndpoints::from_config(&[EndpointConfig::fallback()]);
        let response = endpoints.serve("/fallback").unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, "fallback");
        assert_eq!(response.headers[header::CONTENT_TYPE], "text/plain;charset=UTF-8");
        assert!(endpoints.serve("/missing").is_none());
    }
}
