//! Playlist pipeline error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaylistError {
    /// Original or rewritten URI could not be parsed. Recovered per track.
    #[error("malformed uri {uri:?}: {source}")]
    MalformedUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    /// Destination write failed. Fatal for the whole pass.
    #[error("failed to write proxied playlist: {0}")]
    SinkWrite(#[from] std::io::Error),
}

impl PlaylistError {
    pub fn malformed(uri: impl Into<String>, source: url::ParseError) -> Self {
        Self::MalformedUri {
            uri: uri.into(),
            source,
        }
    }
}
