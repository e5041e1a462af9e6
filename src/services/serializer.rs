//! Proxied playlist serialization
//!
//! One pass over the parsed playlist produces both the M3U text handed to
//! clients and the filtered track list the stream dispatcher resolves
//! survivor indices against. Both always describe the same tracks in the
//! same order.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::io;

use crate::error::PlaylistError;
use crate::models::{Playlist, Track};
use crate::services::exclusion::ExclusionRules;
use crate::services::rewriter::{rewrite, ProxyRewriteConfig, RewriteMode};

pub const M3U_HEADER: &str = "#EXTM3U";

/// Result of one serialization pass
#[derive(Debug, Clone, Default)]
pub struct Serialized {
    pub text: String,
    /// Surviving tracks with original URIs and disallowed tags stripped
    pub playlist: Playlist,
    pub excluded: usize,
    pub failed: usize,
}

impl Serialized {
    pub fn written(&self) -> usize {
        self.playlist.len()
    }
}

/// Filter, rewrite and render `playlist`
pub fn serialize(
    playlist: Playlist,
    rules: &ExclusionRules,
    config: &ProxyRewriteConfig,
    mode: RewriteMode<'_>,
) -> Serialized {
    let mut out = Serialized {
        text: format!("{}\n", M3U_HEADER),
        playlist: Vec::with_capacity(playlist.len()),
        ..Default::default()
    };

    for track in playlist {
        if rules.should_exclude(&track) {
            out.excluded += 1;
            continue;
        }

        // Survivor index: position among tracks already written
        let index = out.playlist.len();
        let uri = match rewrite(&track.uri, index, mode, config) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(track = %track.name, error = %e, "failed to rewrite track uri");
                out.failed += 1;
                continue;
            }
        };

        write_entry(&mut out.text, &track, &uri);
        out.playlist.push(rules.strip_tags(track));
    }

    out
}

/// Serialize and write the text to `sink` in one piece
pub fn serialize_into<W: io::Write>(
    playlist: Playlist,
    rules: &ExclusionRules,
    config: &ProxyRewriteConfig,
    mode: RewriteMode<'_>,
    sink: &mut W,
) -> Result<Serialized, PlaylistError> {
    let out = serialize(playlist, rules, config, mode);
    sink.write_all(out.text.as_bytes())?;
    sink.flush()?;
    Ok(out)
}

/// `#EXTINF:<length> k="v" ...,<name>` followed by the URI line
fn write_entry(buf: &mut String, track: &Track, uri: &str) {
    // Writing into a String cannot fail
    let _ = write!(buf, "#EXTINF:{}", track.length);
    for tag in &track.tags {
        let _ = write!(buf, " {}=\"{}\"", single_line(&tag.name), quoted(&tag.value));
    }
    let _ = writeln!(buf, ",{}", single_line(&track.name));
    let _ = writeln!(buf, "{}", uri);
}

/// Escape a tag value so it cannot end its quotes or its line
fn quoted(value: &str) -> Cow<'_, str> {
    if !value.contains(['"', '\\', '\n', '\r']) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Line breaks become spaces
fn single_line(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r']) {
        Cow::Owned(value.replace(['\n', '\r'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
