//! Stream URL rewriting
//!
//! Turns an upstream stream URI into a URL served by this proxy. Two policies:
//!
//! - **Generic**: `/<collision>/<user>/<password>/<index>/<basename>`. The
//!   survivor index is the only link back to the upstream URI, so the
//!   dispatcher resolves it against the filtered playlist of the same pass.
//! - **Xtream**: the upstream path shape is kept and only the credential
//!   segments are swapped for the proxy's own.

use url::Url;

use crate::error::PlaylistError;
use crate::services::xtream::XtreamCredentials;

/// Immutable inputs for URL rewriting
#[derive(Debug, Clone)]
pub struct ProxyRewriteConfig {
    /// Advertised proxy hostname
    pub hostname: String,
    pub advertised_port: u16,
    pub https: bool,
    /// Extra path prefix without surrounding slashes (reverse proxy setups)
    pub custom_endpoint: Option<String>,
    /// Path token that keeps stream routes apart from other endpoints
    pub collision_segment: String,
    /// Proxy-side credentials
    pub user: String,
    pub password: String,
    /// Upstream Xtream credentials substituted out in Xtream mode
    pub xtream: Option<XtreamCredentials>,
}

impl ProxyRewriteConfig {
    pub fn scheme(&self) -> &'static str {
        if self.https {
            "https"
        } else {
            "http"
        }
    }
}

/// Path construction policy, selected once per serialization pass
#[derive(Debug, Clone, Copy)]
pub enum RewriteMode<'a> {
    Generic,
    Xtream(&'a XtreamCredentials),
}

/// Placeholder last segment for upstream URIs without a basename
const DEFAULT_BASENAME: &str = "stream";

/// Build the proxy URL for the `index`-th surviving track
pub fn rewrite(
    original: &str,
    index: usize,
    mode: RewriteMode<'_>,
    config: &ProxyRewriteConfig,
) -> Result<String, PlaylistError> {
    let url = Url::parse(original).map_err(|e| PlaylistError::malformed(original, e))?;

    let path = match mode {
        RewriteMode::Generic => generic_path(&url, index, config),
        RewriteMode::Xtream(upstream) => substitute_credentials(url.path(), upstream, config),
    };

    let mut basic_auth = url.username().to_string();
    if let Some(password) = url.password() {
        basic_auth.push(':');
        basic_auth.push_str(password);
    }
    if !basic_auth.is_empty() {
        basic_auth.push('@');
    }

    let custom_endpoint = config
        .custom_endpoint
        .as_deref()
        .map(|e| e.trim_matches('/'))
        .filter(|e| !e.is_empty())
        .map(|e| format!("/{}", e))
        .unwrap_or_default();

    let composed = format!(
        "{}://{}{}:{}{}{}",
        config.scheme(),
        basic_auth,
        config.hostname,
        config.advertised_port,
        custom_endpoint,
        path
    );

    // Validated but emitted as composed, so an explicit default port survives
    match Url::parse(&composed) {
        Ok(_) => Ok(composed),
        Err(e) => Err(PlaylistError::malformed(composed, e)),
    }
}

/// `/<collision>/<user>/<password>/<index>/<basename>`, every segment present
/// so the dispatch route always matches
fn generic_path(url: &Url, index: usize, config: &ProxyRewriteConfig) -> String {
    format!(
        "/{}/{}/{}/{}/{}",
        config.collision_segment,
        urlencoding::encode(&config.user),
        urlencoding::encode(&config.password),
        index,
        basename(url.path()).unwrap_or(DEFAULT_BASENAME)
    )
}

/// Last non-empty path segment
fn basename(path: &str) -> Option<&str> {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

/// Swap path segments that decode to an upstream credential
fn substitute_credentials(
    path: &str,
    upstream: &XtreamCredentials,
    config: &ProxyRewriteConfig,
) -> String {
    let user = urlencoding::encode(&config.user);
    let password = urlencoding::encode(&config.password);

    path.split('/')
        .map(|segment| {
            if segment.is_empty() {
                return segment;
            }
            // Undecodable segments cannot hold a credential
            let Ok(decoded) = urlencoding::decode(segment) else {
                return segment;
            };
            if decoded == upstream.username.as_str() {
                &*user
            } else if decoded == upstream.password.as_str() {
                &*password
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
