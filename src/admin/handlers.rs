use axum::{extract::State, Json};
use serde::Serialize;

use crate::filter::Filter;
use crate::http::AppState;
use crate::resilience::BreakerSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub routes: usize,
    pub breakers: usize,
}

#[derive(Serialize)]
pub struct RouteSummary {
    pub id: String,
    pub uri: String,
    pub filters: Vec<&'static str>,
    pub breaker: Option<String>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        routes: state.gateway.routes().len(),
        breakers: state.gateway.breakers().snapshots().len(),
    })
}

/// Routes in evaluation order.
pub async fn get_routes(State(state): State<AppState>) -> Json<Vec<RouteSummary>> {
    let table = state.gateway.routes();
    let routes = table
        .routes()
        .iter()
        .map(|route| RouteSummary {
            id: route.id.clone(),
            uri: route.uri.to_string(),
            filters: route.filters.filters().iter().map(Filter::name).collect(),
            breaker: route.filters.breaker().map(|s| s.name.clone()),
        })
        .collect();
    Json(routes)
}

pub async fn get_breakers(State(state): State<AppState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.gateway.breakers().snapshots())
}
