//! Xtream Codes Integration
//!
//! Upstream Xtream credentials, either configured explicitly or extracted
//! from a `get.php` playlist URL.
//!
//! Xtream M3U URLs typically follow this pattern:
//! ```text
//! http://server:port/get.php?username=X&password=Y&type=m3u_plus&output=ts
//! ```
//!
//! Stream URLs in those playlists carry the credentials as path segments:
//! ```text
//! http://server:port/live/X/Y/123.ts
//! ```

pub mod detector;
pub mod types;

pub use detector::extract_credentials;
pub use types::XtreamCredentials;
