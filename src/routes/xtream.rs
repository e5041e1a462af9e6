//! Xtream Codes Proxy Routes
//!
//! Mirror the upstream Xtream path convention: the playlist comes from
//! `get.php` with credential segments swapped for the proxy's own, and stream
//! requests are forwarded to the same path upstream with the upstream
//! credentials put back.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use super::playlist::M3U_CONTENT_TYPE;
use super::proxy::forward;
use super::{api_error, authorize, ApiError};
use crate::services::m3u_parser::parse;
use crate::services::metrics::{self, STREAM_REQUESTS};
use crate::services::rewriter::RewriteMode;
use crate::services::serializer::serialize;
use crate::services::xtream::XtreamCredentials;
use crate::AppState;

#[derive(Deserialize)]
pub struct GetPhpQuery {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "type")]
    pub playlist_type: String,
    #[serde(default)]
    pub output: String,
}

#[derive(Deserialize)]
pub struct StreamPath {
    pub user: String,
    pub password: String,
    pub stream: String,
}

fn upstream(state: &AppState) -> Result<&XtreamCredentials, ApiError> {
    state
        .rewrite
        .xtream
        .as_ref()
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Xtream upstream not configured"))
}

/// GET /get.php?username=&password=&type=&output= - Upstream Xtream playlist, credentials swapped
pub async fn get_php(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GetPhpQuery>,
) -> Result<Response, ApiError> {
    authorize(&state, &query.username, &query.password)?;
    let creds = upstream(&state)?;

    let url = creds.get_php_url(&query.playlist_type, &query.output);
    let text = state.parser.fetch_text(&url).await.map_err(|e| {
        tracing::error!("Failed to fetch Xtream playlist from {}: {:#}", creds.server, e);
        api_error(StatusCode::BAD_GATEWAY, "Failed to fetch upstream playlist")
    })?;

    let out = serialize(parse(&text), &state.rules, &state.rewrite, RewriteMode::Xtream(creds));
    metrics::record_pass(&out);
    tracing::info!(
        "Xtream playlist served: {} tracks ({} excluded, {} failed)",
        out.written(),
        out.excluded,
        out.failed
    );

    Ok(([(header::CONTENT_TYPE, M3U_CONTENT_TYPE)], out.text).into_response())
}

/// GET /live/:user/:password/*stream
pub async fn live_stream(
    state: State<Arc<AppState>>,
    path: Path<StreamPath>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    stream(Some("live"), state, path, headers).await
}

/// GET /movie/:user/:password/*stream
pub async fn movie_stream(
    state: State<Arc<AppState>>,
    path: Path<StreamPath>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    stream(Some("movie"), state, path, headers).await
}

/// GET /series/:user/:password/*stream
pub async fn series_stream(
    state: State<Arc<AppState>>,
    path: Path<StreamPath>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    stream(Some("series"), state, path, headers).await
}

/// GET /:user/:password/:stream - Kind-less live link
pub async fn direct_stream(
    state: State<Arc<AppState>>,
    path: Path<StreamPath>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    stream(None, state, path, headers).await
}

async fn stream(
    kind: Option<&'static str>,
    State(state): State<Arc<AppState>>,
    Path(path): Path<StreamPath>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &path.user, &path.password)?;
    let creds = upstream(&state)?;

    STREAM_REQUESTS
        .with_label_values(&[kind.unwrap_or("live")])
        .inc();
    let url = creds.stream_url(kind, &path.stream);
    tracing::debug!(kind = kind.unwrap_or("live"), stream = %path.stream, "Proxying Xtream stream");

    forward(&state.stream_client, &url, &headers).await
}
