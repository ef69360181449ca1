//! Path rewriting filters.

use crate::error::GatewayResult;
use crate::gateway::GatewayRequest;

/// Drop the first `parts` path segments.
pub fn strip_prefix(req: &mut GatewayRequest, parts: usize) -> GatewayResult<()> {
    let remaining: Vec<&str> = req
        .path()
        .split('/')
        .filter(|s| !s.is_empty())
        .skip(parts)
        .collect();
    let mut path = format!("/{}", remaining.join("/"));
    if req.path().ends_with('/') && path.len() > 1 {
        path.push('/');
    }
    req.set_path(&path, "strip_prefix")
}

/// Prepend `prefix` to the path.
pub fn prefix_path(req: &mut GatewayRequest, prefix: &str) -> GatewayResult<()> {
    let path = format!("{}{}", prefix, req.path());
    req.set_path(&path, "prefix_path")
}
