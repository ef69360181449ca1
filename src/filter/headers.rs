//! Header filters.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

pub(crate) fn parse_name(name: &str) -> Result<HeaderName, String> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| format!("invalid header name '{}'", name))
}

pub(crate) fn parse_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), String> {
    let value = HeaderValue::from_str(value).map_err(|_| format!("invalid header value '{}'", value))?;
    Ok((parse_name(name)?, value))
}

/// Append, keeping any values already present.
pub fn append(headers: &mut HeaderMap, name: &HeaderName, value: &HeaderValue) {
    headers.append(name.clone(), value.clone());
}

pub fn remove(headers: &mut HeaderMap, name: &HeaderName) {
    headers.remove(name);
}
