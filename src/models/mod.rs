mod track;

pub use track::{CredentialsQuery, Playlist, Tag, Track, TracksQuery, TracksResponse};
