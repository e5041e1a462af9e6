use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use super::{api_error, authorize, ApiError};
use crate::services::metrics::STREAM_REQUESTS;
use crate::AppState;

// Re-export reqwest header module to avoid version conflicts
mod reqwest_header {
    pub use reqwest::header::{
        ACCEPT, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED, RANGE,
    };
}

/// Path of a generic-mode stream URL. The trailing basename is informational.
#[derive(Deserialize)]
pub struct TrackPath {
    pub user: String,
    pub password: String,
    pub index: usize,
}

/// Guess content type from URL
fn guess_content_type(url: &str) -> &'static str {
    let lower = url.to_lowercase();
    if lower.contains(".m3u8") {
        "application/vnd.apple.mpegurl"
    } else if lower.contains(".mp4") {
        "video/mp4"
    } else if lower.contains(".mkv") {
        "video/x-matroska"
    } else if lower.contains(".avi") {
        "video/x-msvideo"
    } else {
        "video/MP2T"
    }
}

/// GET /<collision_segment>/:user/:password/:index/:name
/// Resolves the survivor index against the published playlist and streams the original URI.
pub async fn stream_track(
    State(state): State<Arc<AppState>>,
    Path(path): Path<TrackPath>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &path.user, &path.password)?;

    let playlist = state
        .store
        .current()
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "No playlist configured"))?;

    let track = playlist
        .tracks
        .get(path.index)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Track not found"))?;

    STREAM_REQUESTS.with_label_values(&["m3u"]).inc();
    tracing::debug!(index = path.index, track = %track.name, "Proxying track");

    forward(&state.stream_client, &track.uri, &headers).await
}

/// Stream `url` back to the client, passing through the essential headers
pub async fn forward(client: &Client, url: &str, headers: &HeaderMap) -> Result<Response, ApiError> {
    let mut request = client.get(url);

    // Forward essential headers (using reqwest's header constants)
    match headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) {
        Some(accept) => request = request.header(reqwest_header::ACCEPT, accept),
        None => request = request.header(reqwest_header::ACCEPT, "*/*"),
    }

    // Forward Range header for partial content requests
    if let Some(range) = headers.get(header::RANGE).and_then(|v| v.to_str().ok()) {
        request = request.header(reqwest_header::RANGE, range);
    }

    let upstream_response = request.send().await.map_err(|e| {
        let status = if e.is_timeout() {
            StatusCode::GATEWAY_TIMEOUT
        } else {
            StatusCode::BAD_GATEWAY
        };
        tracing::error!("Stream proxy error for {}: {}", url, e);
        (
            status,
            axum::Json(serde_json::json!({
                "error": "Failed to proxy stream",
                "detail": e.to_string()
            })),
        )
    })?;

    let upstream_status = upstream_response.status();
    let upstream_headers = upstream_response.headers();

    let content_type = upstream_headers
        .get(reqwest_header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| HeaderValue::from_str(s).ok())
        .unwrap_or_else(|| HeaderValue::from_static(guess_content_type(url)));

    let mut response = Response::builder()
        .status(StatusCode::from_u16(upstream_status.as_u16()).unwrap_or(StatusCode::OK))
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    // Read with reqwest constants, write with axum ones
    let passthrough = [
        (reqwest_header::CONTENT_LENGTH, header::CONTENT_LENGTH),
        (reqwest_header::ACCEPT_RANGES, header::ACCEPT_RANGES),
        (reqwest_header::ETAG, header::ETAG),
        (reqwest_header::LAST_MODIFIED, header::LAST_MODIFIED),
    ];
    for (upstream_name, name) in passthrough {
        if let Some(value) = upstream_headers
            .get(upstream_name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| HeaderValue::from_str(s).ok())
        {
            response = response.header(name, value);
        }
    }

    let body = Body::from_stream(upstream_response.bytes_stream());

    response.body(body).map_err(|e| {
        tracing::error!("Failed to build response: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{get, published_state, state_with};

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("http://a/x.m3u8"), "application/vnd.apple.mpegurl");
        assert_eq!(guess_content_type("http://a/x.MKV"), "video/x-matroska");
        assert_eq!(guess_content_type("http://a/x.ts"), "video/MP2T");
        assert_eq!(guess_content_type("http://a/live/1"), "video/MP2T");
    }

    #[tokio::test]
    async fn test_stream_rejects_bad_credentials() {
        let response = get(published_state().await, "/abc123/bob/nope/0/a.ts").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_stream_unknown_index() {
        let response = get(published_state().await, "/abc123/bob/pw/3/x.ts").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stream_without_playlist() {
        let response = get(state_with(&[]), "/abc123/bob/pw/0/a.ts").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stream_wrong_collision_segment() {
        let response = get(published_state().await, "/other/bob/pw/0/a.ts").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stream_unreachable_upstream() {
        let state = state_with(&[]);
        state
            .store
            .publish(crate::services::store::ProxiedPlaylist {
                text: String::new(),
                tracks: vec![crate::models::Track::new("Dead", "http://127.0.0.1:1/dead.ts")],
            })
            .await;

        let response = get(state, "/abc123/bob/pw/0/dead.ts").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    /// Every URL of a refreshed playlist must reach its track's upstream
    #[tokio::test]
    async fn test_refreshed_playlist_urls_are_served() {
        let source = std::env::temp_dir().join(format!("{}.m3u", uuid::Uuid::new_v4()));
        tokio::fs::write(
            &source,
            "#EXTM3U\n\
             #EXTINF:-1,Skipped\nhttp://127.0.0.1:1/skip/1.ts\n\
             #EXTINF:-1,Live\nhttp://127.0.0.1:1/live/10/20/300.ts\n\
             #EXTINF:-1,Root\nhttp://127.0.0.1:1/\n\
             #EXTINF:-1,Folder\nhttp://127.0.0.1:1/vod/\n",
        )
        .await
        .unwrap();

        let state = state_with(&[("M3U_EXCLUDE_INFO", "Skipped")]);
        let written = state
            .store
            .refresh(&state.parser, source.to_str().unwrap(), &state.rules, &state.rewrite)
            .await
            .unwrap();
        let _ = tokio::fs::remove_file(&source).await;
        let _ = tokio::fs::remove_file(state.store.output_path()).await;

        let playlist = state.store.current().await.unwrap();
        let paths: Vec<String> = playlist
            .text
            .lines()
            .filter(|l| !l.starts_with('#'))
            .map(|l| url::Url::parse(l).unwrap().path().to_string())
            .collect();

        assert_eq!(written, 3);
        assert_eq!(
            paths,
            vec!["/abc123/bob/pw/0/300.ts", "/abc123/bob/pw/1/stream", "/abc123/bob/pw/2/vod"]
        );
        for path in paths {
            let response = get(state.clone(), &path).await;
            assert_eq!(response.status(), StatusCode::BAD_GATEWAY, "{}", path);
        }
    }
}
