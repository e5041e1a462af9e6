//! Xtream Codes upstream credentials

/// Credentials for an upstream Xtream Codes server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XtreamCredentials {
    /// Server base URL (e.g., "http://example.com:8080")
    pub server: String,
    /// Username for authentication
    pub username: String,
    /// Password for authentication
    pub password: String,
}

impl XtreamCredentials {
    pub fn new(server: &str, username: &str, password: &str) -> Self {
        Self {
            server: server.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Build the get.php playlist URL
    pub fn get_php_url(&self, playlist_type: &str, output: &str) -> String {
        let mut url = format!(
            "{}/get.php?username={}&password={}",
            self.server,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password)
        );
        if !playlist_type.is_empty() {
            url.push_str("&type=");
            url.push_str(&urlencoding::encode(playlist_type));
        }
        if !output.is_empty() {
            url.push_str("&output=");
            url.push_str(&urlencoding::encode(output));
        }
        url
    }

    /// Build playback URL for a stream. `kind` is live, movie or series;
    /// `None` is the kind-less live form `<server>/<user>/<password>/<stream>`.
    /// `stream` may span several segments.
    pub fn stream_url(&self, kind: Option<&str>, stream: &str) -> String {
        let kind = kind.map(|k| format!("/{}", k)).unwrap_or_default();
        format!(
            "{}{}/{}/{}/{}",
            self.server,
            kind,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password),
            stream
        )
    }
}
