use std::env;
use std::path::PathBuf;

use crate::services::exclusion::{EmptyPattern, ExclusionRules};
use crate::services::rewriter::ProxyRewriteConfig;
use crate::services::xtream::{extract_credentials, XtreamCredentials};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub hostname: String,
    pub advertised_port: u16,
    pub https: bool,
    pub custom_endpoint: Option<String>,
    pub collision_segment: String,

    // Playlist
    pub m3u_url: Option<String>,
    pub m3u_file_name: String,
    pub proxied_m3u_path: PathBuf,
    pub playlist_refresh_secs: u64,

    // Proxy credentials
    pub user: String,
    pub password: String,

    // Xtream upstream
    pub xtream: Option<XtreamCredentials>,

    // Exclusions
    pub exclude_info: String,
    pub exclude_uri: String,
    pub exclude_key_tag: String,
    pub exclude_empty_matches_all: bool,

    // Fetching
    pub fetch_timeout_ms: u64,
    pub stream_connect_timeout_ms: u64,
    pub max_retries: u32,
    pub max_m3u_size_mb: usize,
    pub user_agent: String,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let optional = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        // Credentials become path segments, so they are never empty
        let credential = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let flag = |key: &str| {
            lookup(key)
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false)
        };

        let port = lookup("PORT").and_then(|v| v.parse().ok()).unwrap_or(8080);
        let m3u_url = optional("M3U_URL");

        Self {
            // Server
            port,
            hostname: string("HOSTNAME", "localhost"),
            advertised_port: lookup("ADVERTISED_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(port),
            https: flag("HTTPS"),
            custom_endpoint: optional("CUSTOM_ENDPOINT")
                .map(|v| v.trim_matches('/').to_string())
                .filter(|v| !v.is_empty()),
            collision_segment: collision_segment(lookup("CUSTOM_ID").as_deref()),

            // Playlist
            m3u_file_name: string("M3U_FILE_NAME", "iptv.m3u")
                .trim_matches('/')
                .to_string(),
            proxied_m3u_path: optional("PROXIED_M3U_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| {
                    env::temp_dir().join(format!("{}.iptv-proxy.m3u", uuid::Uuid::new_v4()))
                }),
            playlist_refresh_secs: lookup("PLAYLIST_REFRESH_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),

            // Proxy credentials
            user: credential("PROXY_USER", "usertest"),
            password: credential("PROXY_PASSWORD", "passwordtest"),

            // Xtream upstream: explicit settings win, else a get.php M3U URL
            xtream: match (
                optional("XTREAM_BASE_URL"),
                optional("XTREAM_USER"),
                optional("XTREAM_PASSWORD"),
            ) {
                (Some(server), Some(user), Some(password)) => {
                    Some(XtreamCredentials::new(&server, &user, &password))
                }
                _ => m3u_url.as_deref().and_then(extract_credentials),
            },
            m3u_url,

            // Exclusions
            exclude_info: string("M3U_EXCLUDE_INFO", ""),
            exclude_uri: string("M3U_EXCLUDE_URI", ""),
            exclude_key_tag: string("M3U_EXCLUDE_KEY_TAG", ""),
            exclude_empty_matches_all: flag("M3U_EXCLUDE_EMPTY_MATCHES_ALL"),

            // Fetching
            fetch_timeout_ms: lookup("FETCH_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(60_000), // 1 minute
            stream_connect_timeout_ms: lookup("STREAM_CONNECT_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            max_retries: lookup("MAX_RETRIES").and_then(|v| v.parse().ok()).unwrap_or(3),
            max_m3u_size_mb: lookup("MAX_M3U_SIZE_MB")
                .and_then(|v| v.parse().ok())
                .unwrap_or(200),

            // Use VLC user agent to avoid IPTV server blocks
            user_agent: string("USER_AGENT", "VLC/3.0.20 LibVLC/3.0.20"),
        }
    }

    /// Immutable inputs for the URL rewriter
    pub fn rewrite_config(&self) -> ProxyRewriteConfig {
        ProxyRewriteConfig {
            hostname: self.hostname.clone(),
            advertised_port: self.advertised_port,
            https: self.https,
            custom_endpoint: self.custom_endpoint.clone(),
            collision_segment: self.collision_segment.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            xtream: self.xtream.clone(),
        }
    }

    pub fn exclusion_rules(&self) -> ExclusionRules {
        let empty = if self.exclude_empty_matches_all {
            EmptyPattern::MatchAll
        } else {
            EmptyPattern::Ignore
        };
        ExclusionRules::from_csv(&self.exclude_info, &self.exclude_uri, &self.exclude_key_tag, empty)
    }
}

/// `CUSTOM_ID` without slashes, else the first group of a random UUID
fn collision_segment(custom_id: Option<&str>) -> String {
    match custom_id.map(|id| id.trim_matches('/')).filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => uuid::Uuid::new_v4()
            .to_string()
            .split('-')
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
