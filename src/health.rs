//! `GET /_junction/health` endpoint handler.
//!
//! Returns a [`HealthResponse`] JSON payload with the server version,
//! uptime, the size of the current route table, and cumulative request
//! statistics. The path is reserved on every host.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

pub const HEALTH_PATH: &str = "/_junction/health";

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub routes: RoutesHealth,
    pub stats: StatsResponse,
}

#[derive(Serialize, Deserialize)]
pub struct RoutesHealth {
    pub rules: usize,
    pub endpoints: usize,
    pub no_match_status: u16,
}

#[derive(Serialize, Deserialize)]
pub struct StatsResponse {
    pub requests_forwarded: u64,
    pub requests_failed: u64,
    pub requests_unmatched: u64,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.table.snapshot();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        routes: RoutesHealth {
            rules: snapshot.len(),
            endpoints: snapshot.endpoint_count(),
            no_match_status: state.options.no_match_status.as_u16(),
        },
        stats: StatsResponse {
            requests_forwarded: state.stats.forwarded.load(Ordering::Relaxed),
            requests_failed: state.stats.failed.load(Ordering::Relaxed),
            requests_unmatched: state.stats.unmatched.load(Ordering::Relaxed),
        },
    })
}
