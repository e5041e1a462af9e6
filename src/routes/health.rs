use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Root endpoint - basic status
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "iptv-proxy",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Health check response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    uptime: u64,
    playlist_loaded: bool,
    tracks: usize,
    xtream: bool,
}

/// GET /health - Service health
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    let playlist = state.store.current().await;

    // A configured playlist that never loaded means stream lookups will fail
    let status = match (&state.config.m3u_url, &playlist) {
        (Some(_), None) => "degraded",
        _ => "ok",
    };

    Json(HealthResponse {
        status: status.to_string(),
        uptime,
        playlist_loaded: playlist.is_some(),
        tracks: playlist.map(|p| p.tracks.len()).unwrap_or(0),
        xtream: state.rewrite.xtream.is_some(),
    })
}

/// GET /metrics - Prometheus metrics
pub async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                b"Internal Server Error".to_vec(),
            )
        }
    }
}

/// Readiness probe (for Kubernetes)
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.config.m3u_url.is_none() || state.store.current().await.is_some() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready - playlist not loaded")
    }
}

/// Liveness probe (for Kubernetes)
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}
