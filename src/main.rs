mod config;
mod error;
mod models;
mod routes;
mod services;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::services::{
    exclusion::ExclusionRules,
    m3u_parser::M3UParser,
    rewriter::ProxyRewriteConfig,
    store::{start_refresh_task, PlaylistStore},
};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub rewrite: ProxyRewriteConfig,
    pub rules: ExclusionRules,
    pub parser: M3UParser,
    pub store: PlaylistStore,
    pub stream_client: reqwest::Client,
    pub start_time: Instant,
}

/// Build the router. Stream routes depend on the configured collision
/// segment and file name; Xtream routes exist only with an Xtream upstream.
pub fn build_router(state: Arc<AppState>) -> Router {
    let playlist_routes = Router::new()
        .route(
            &format!("/{}", state.config.m3u_file_name),
            get(routes::playlist::get_m3u),
        )
        .route("/api/playlist/tracks", get(routes::playlist::get_tracks));

    let mut app = Router::new()
        // Health endpoints
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/ready", get(routes::health::ready))
        .route("/live", get(routes::health::live))
        // Generic-mode stream dispatch
        .route(
            &format!("/{}/:user/:password/:index/:name", state.config.collision_segment),
            get(routes::proxy::stream_track),
        );

    if state.rewrite.xtream.is_some() {
        app = app
            .route("/get.php", get(routes::xtream::get_php))
            .route("/live/:user/:password/*stream", get(routes::xtream::live_stream))
            .route("/movie/:user/:password/*stream", get(routes::xtream::movie_stream))
            .route("/series/:user/:password/*stream", get(routes::xtream::series_stream))
            .route("/:user/:password/:stream", get(routes::xtream::direct_stream));
    }

    app.merge(playlist_routes.layer(CompressionLayer::new()))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iptv_proxy=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();
    let port = config.port;

    tracing::info!("Starting iptv-proxy v{}", env!("CARGO_PKG_VERSION"));

    let parser = M3UParser::new(
        &config.user_agent,
        config.fetch_timeout_ms,
        config.max_retries,
        config.max_m3u_size_mb,
    )?;

    // No total timeout: live streams stay open indefinitely
    let stream_client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .connect_timeout(Duration::from_millis(config.stream_connect_timeout_ms))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()?;

    let state = Arc::new(AppState {
        rewrite: config.rewrite_config(),
        rules: config.exclusion_rules(),
        store: PlaylistStore::new(config.proxied_m3u_path.clone()),
        parser,
        stream_client,
        start_time: Instant::now(),
        config,
    });

    let rewrite = &state.rewrite;
    let custom_endpoint = rewrite
        .custom_endpoint
        .as_deref()
        .map(|e| format!("/{}", e))
        .unwrap_or_default();
    let base = format!(
        "{}://{}:{}{}",
        rewrite.scheme(),
        rewrite.hostname,
        rewrite.advertised_port,
        custom_endpoint
    );

    match state.config.m3u_url.as_deref() {
        Some(source) => {
            state
                .store
                .refresh(&state.parser, source, &state.rules, &state.rewrite)
                .await?;
            tracing::info!(
                "M3U playlist available at {}/{}?username={}&password={} (file: {})",
                base,
                state.config.m3u_file_name,
                rewrite.user,
                rewrite.password,
                state.store.output_path().display()
            );

            if state.config.playlist_refresh_secs > 0 {
                tokio::spawn(start_refresh_task(
                    state.clone(),
                    state.config.playlist_refresh_secs,
                ));
            }
        }
        None => tracing::info!("No M3U_URL configured, playlist routes will return 404"),
    }

    if let Some(xtream) = &rewrite.xtream {
        tracing::info!(
            "Xtream upstream {} proxied at {}/get.php?username={}&password={}",
            xtream.server,
            base,
            rewrite.user,
            rewrite.password
        );
    }

    let app = build_router(state.clone());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
