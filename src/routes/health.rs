// src/routes/health.rs
//! Liveness endpoint for the ingestion service.
//!
//! `GET /health` lets container orchestrators check that the process is up
//! and reports which topic filters it was configured with. It never touches
//! the database or the broker and exposes no reading data.
//!
//! EMBP: the gateway (`mod.rs`) merges the subrouter returned here; `main.rs`
//! does not know about individual endpoints.

use std::time::Instant;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;

/// JSON response body for the `/health` endpoint.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    uptime_secs: u64,
    subscriptions: Vec<String>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(build_response(&state, Instant::now()))
}

fn build_response(state: &AppState, now: Instant) -> HealthResponse {
    // ---
    HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: now.saturating_duration_since(state.started_at).as_secs(),
        subscriptions: state.subscriptions.to_vec(),
    }
}

/// Subrouter containing the `/health` route.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
