use serde::{Deserialize, Serialize};

/// Single `key="value"` attribute from an EXTINF line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Single playlist entry (channel/movie/episode)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub name: String,
    /// Duration hint from EXTINF, `-1` for live streams
    pub length: i64,
    /// Original upstream stream location
    pub uri: String,
    /// Attributes in source order
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Track {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            length: -1,
            uri: uri.into(),
            tags: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(name, value));
        self
    }

    #[cfg(test)]
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value.as_str())
    }
}

/// Ordered sequence of tracks
pub type Playlist = Vec<Track>;

/// Query parameters for the tracks endpoint
#[derive(Debug, Deserialize)]
pub struct TracksQuery {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Paginated tracks response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TracksResponse {
    pub tracks: Vec<Track>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

/// Credentials passed as query parameters (`?username=&password=`)
#[derive(Debug, Deserialize)]
pub struct CredentialsQuery {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}
