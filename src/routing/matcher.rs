//! Route predicates.
//!
//! # Responsibilities
//! - Match host header (wildcard labels, case-insensitive, port ignored)
//! - Match path patterns (exact, `*` segment, trailing `**` subtree)
//! - Match method, header and query parameter presence/value
//! - Combine conditions with AND / OR / NOT
//!
//! # Design Decisions
//! - Predicates are compiled once and never mutated
//! - Evaluation is pure and short-circuits
//! - No regex to keep matching linear in the pattern length

use axum::http::{HeaderName, Method};

use crate::config::PredicateConfig;
use crate::gateway::GatewayRequest;

/// A boolean matcher over request attributes.
#[derive(Debug, Clone)]
pub enum Predicate {
    Always,
    Path(PathPattern),
    Host(HostPattern),
    Method(Method),
    Header {
        name: HeaderName,
        value: Option<String>,
    },
    Query {
        name: String,
        value: Option<String>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Returns true if the request matches this condition.
    pub fn matches(&self, req: &GatewayRequest) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Path(pattern) => pattern.matches(req.path()),
            Predicate::Host(pattern) => req.host().is_some_and(|host| pattern.matches(host)),
            Predicate::Method(method) => req.method == *method,
            Predicate::Header { name, value } => match value {
                None => req.headers.contains_key(name),
                Some(expected) => req
                    .headers
                    .get_all(name)
                    .iter()
                    .any(|v| v.to_str().is_ok_and(|v| v == expected)),
            },
            Predicate::Query { name, value } => match (req.query_param(name), value) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
            },
            Predicate::And(all) => all.iter().all(|p| p.matches(req)),
            Predicate::Or(any) => any.iter().any(|p| p.matches(req)),
            Predicate::Not(inner) => !inner.matches(req),
        }
    }

    /// Compile a config tree. Populated fields combine with AND.
    pub fn compile(config: &PredicateConfig) -> Result<Self, String> {
        let mut parts = Vec::new();

        if let Some(path) = &config.path {
            parts.push(Predicate::Path(PathPattern::parse(path)?));
        }
        if let Some(host) = &config.host {
            parts.push(Predicate::Host(HostPattern::parse(host)?));
        }
        if let Some(method) = &config.method {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .map_err(|_| format!("invalid method '{}'", method))?;
            parts.push(Predicate::Method(method));
        }
        if let Some(header) = &config.header {
            let name = HeaderName::from_bytes(header.name.as_bytes())
                .map_err(|_| format!("invalid header name '{}'", header.name))?;
            parts.push(Predicate::Header {
                name,
                value: header.value.clone(),
            });
        }
        if let Some(query) = &config.query {
            parts.push(Predicate::Query {
                name: query.name.clone(),
                value: query.value.clone(),
            });
        }
        for nested in &config.all {
            parts.push(Predicate::compile(nested)?);
        }
        if !config.any.is_empty() {
            let any = config
                .any
                .iter()
                .map(Predicate::compile)
                .collect::<Result<Vec<_>, _>>()?;
            parts.push(Predicate::Or(any));
        }
        if let Some(not) = &config.not {
            parts.push(Predicate::Not(Box::new(Predicate::compile(not)?)));
        }

        Ok(match parts.len() {
            0 => Predicate::Always,
            1 => parts.remove(0),
            _ => Predicate::And(parts),
        })
    }
}

/// Path pattern over `/`-separated segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<String>,
    /// Pattern ended in `/**`.
    subtree: bool,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, String> {
        if !pattern.starts_with('/') {
            return Err(format!("path pattern '{}' must start with '/'", pattern));
        }
        let mut segments: Vec<String> = split_path(pattern).map(str::to_string).collect();
        let subtree = segments.last().is_some_and(|s| s == "**");
        if subtree {
            segments.pop();
        }
        if segments.iter().any(|s| s == "**") {
            return Err(format!("'**' is only allowed as the last segment in '{}'", pattern));
        }
        Ok(Self { segments, subtree })
    }

    pub fn matches(&self, path: &str) -> bool {
        let mut actual = split_path(path);
        for expected in &self.segments {
            match actual.next() {
                Some(segment) if expected == "*" || expected == segment => {}
                _ => return false,
            }
        }
        self.subtree || actual.next().is_none()
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Host pattern over `.`-separated labels.
/// `*` matches one label, `**` matches one or more labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPattern {
    labels: Vec<String>,
}

impl HostPattern {
    pub fn parse(pattern: &str) -> Result<Self, String> {
        let labels: Vec<String> = pattern.split('.').map(str::to_ascii_lowercase).collect();
        if labels.iter().any(String::is_empty) {
            return Err(format!("malformed host pattern '{}'", pattern));
        }
        Ok(Self { labels })
    }

    pub fn matches(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        let labels: Vec<&str> = host.split('.').collect();
        match_labels(&self.labels, &labels)
    }
}

fn match_labels(pattern: &[String], host: &[&str]) -> bool {
    match pattern.split_first() {
        None => host.is_empty(),
        Some((first, rest)) if first == "**" => {
            (1..=host.len()).any(|taken| match_labels(rest, &host[taken..]))
        }
        Some((first, rest)) => match host.split_first() {
            Some((label, remaining)) if first == "*" || first == label => match_labels(rest, remaining),
            _ => false,
        },
    }
}
