//! Xtream Codes URL Detection
//!
//! Detects if an M3U URL is from an Xtream Codes server and extracts its credentials.

use super::types::XtreamCredentials;
use tracing::debug;
use url::Url;

/// Credentials and server origin of an Xtream `get.php` playlist URL
///
/// `http://server:port/get.php?username=X&password=Y&type=m3u_plus` yields
/// server `http://server:port`. Anything else, including missing or empty
/// credentials, yields `None`.
pub fn extract_credentials(m3u_url: &str) -> Option<XtreamCredentials> {
    let url = Url::parse(m3u_url).ok()?;

    let is_get_php = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .is_some_and(|last| last.eq_ignore_ascii_case("get.php"));
    let origin = url.origin();
    if !is_get_php || !origin.is_tuple() {
        return None;
    }

    let param = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    };
    let (username, password) = (param("username")?, param("password")?);

    let server = origin.ascii_serialization();
    debug!(server = %server, username = %username, "Detected Xtream upstream");

    Some(XtreamCredentials::new(&server, &username, &password))
}
