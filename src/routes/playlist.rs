use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::{api_error, authorize, ApiError};
use crate::models::{CredentialsQuery, TracksQuery, TracksResponse};
use crate::AppState;

pub const M3U_CONTENT_TYPE: &str = "audio/x-mpegurl";

/// GET /<m3u_file_name>?username=&password= - Proxied playlist
pub async fn get_m3u(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CredentialsQuery>,
) -> Result<Response, ApiError> {
    authorize(&state, &query.username, &query.password)?;

    let playlist = state
        .store
        .current()
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "No playlist configured"))?;

    let disposition = format!("attachment; filename=\"{}\"", state.config.m3u_file_name);

    Ok((
        [
            (header::CONTENT_TYPE, M3U_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        playlist.text.clone(),
    )
        .into_response())
}

/// GET /api/playlist/tracks - Paginated filtered tracks
pub async fn get_tracks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TracksQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &query.username, &query.password)?;

    let playlist = state
        .store
        .current()
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "No playlist configured"))?;

    let limit = query.limit.min(1000);
    let offset = query.offset;
    let total = playlist.tracks.len();

    let tracks: Vec<_> = playlist
        .tracks
        .iter()
        .skip(offset)
        .take(limit)
        .cloned()
        .collect();

    let has_more = offset + tracks.len() < total;

    Ok(Json(TracksResponse {
        tracks,
        total,
        limit,
        offset,
        has_more,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{body_string, get, published_state, state_with};

    #[tokio::test]
    async fn test_m3u_requires_credentials() {
        let response = get(published_state().await, "/iptv.m3u?username=bob&password=wrong").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = get(published_state().await, "/iptv.m3u").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_m3u_serves_published_text() {
        let response = get(published_state().await, "/iptv.m3u?username=bob&password=pw").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            M3U_CONTENT_TYPE
        );
        let body = body_string(response).await;
        assert!(body.starts_with("#EXTM3U\n"));
        assert!(body.contains("http://proxy.local:8080/abc123/bob/pw/0/a.ts"));
    }

    #[tokio::test]
    async fn test_m3u_not_found_without_playlist() {
        let response = get(state_with(&[]), "/iptv.m3u?username=bob&password=pw").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_custom_file_name() {
        let state = state_with(&[("M3U_FILE_NAME", "/playlist.m3u")]);
        let response = get(state, "/playlist.m3u?username=bob&password=pw").await;
        // Route exists; nothing published yet
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("No playlist configured"));
    }

    #[tokio::test]
    async fn test_tracks_pagination() {
        let response = get(
            published_state().await,
            "/api/playlist/tracks?username=bob&password=pw&limit=2&offset=1",
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["total"], 3);
        assert_eq!(json["tracks"][0]["name"], "B");
        assert_eq!(json["tracks"][1]["name"], "C");
        assert_eq!(json["hasMore"], false);
    }
}
