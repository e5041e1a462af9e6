use anyhow::{anyhow, bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;

use crate::models::{Tag, Track};

lazy_static! {
    /// Regex to parse EXTINF attributes (tvg-id="...", group-title="...", etc)
    static ref ATTR_REGEX: Regex = Regex::new(r#"(\w+(?:-\w+)*)="([^"]*)""#).unwrap();

    /// Regex to extract duration from EXTINF line
    static ref DURATION_REGEX: Regex = Regex::new(r"^-?\d+").unwrap();
}

/// Parsed EXTINF line data
#[derive(Debug)]
struct ExtinfData {
    duration: i64,
    tags: Vec<Tag>,
    title: String,
}

/// Byte offset of the first comma that is not inside a quoted attribute value
fn title_separator(content: &str) -> Option<usize> {
    let mut quoted = false;
    for (i, c) in content.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => return Some(i),
            _ => {}
        }
    }
    None
}

/// Parse an EXTINF line
/// Format: #EXTINF:duration tvg-id="..." tvg-name="..." tvg-logo="..." group-title="...",Title
fn parse_extinf(line: &str) -> Option<ExtinfData> {
    let content = line.strip_prefix("#EXTINF:")?;

    let (header, title) = match title_separator(content) {
        Some(comma) => (&content[..comma], content[comma + 1..].trim()),
        None => (content, ""),
    };

    let duration = DURATION_REGEX
        .find(header.trim_start())
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(-1);

    let tags = ATTR_REGEX
        .captures_iter(header)
        .map(|caps| {
            let key = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let value = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            Tag::new(key, value)
        })
        .collect();

    Some(ExtinfData {
        duration,
        tags,
        title: title.to_string(),
    })
}

/// Parse M3U text into an ordered list of tracks
pub fn parse(text: &str) -> Vec<Track> {
    let mut tracks = Vec::new();
    let mut pending: Option<ExtinfData> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with("#EXTINF:") {
            pending = parse_extinf(trimmed);
            continue;
        }

        // EXTM3U header, EXTVLCOPT, EXTGRP and other directives
        if trimmed.starts_with('#') {
            continue;
        }

        let track = match pending.take() {
            Some(extinf) => Track {
                name: extinf.title,
                length: extinf.duration,
                uri: trimmed.to_string(),
                tags: extinf.tags,
            },
            None => Track::new("", trimmed),
        };
        tracks.push(track);
    }

    tracks
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Loads upstream playlists from a URL or a local file
pub struct M3UParser {
    client: Client,
    max_retries: u32,
    max_m3u_size_mb: usize,
}

impl M3UParser {
    pub fn new(
        user_agent: &str,
        timeout_ms: u64,
        max_retries: u32,
        max_m3u_size_mb: usize,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_millis(timeout_ms))
            .gzip(true)
            .build()
            .context("failed to create playlist HTTP client")?;

        Ok(Self {
            client,
            max_retries,
            max_m3u_size_mb,
        })
    }

    /// Fetch a playlist body, retrying with backoff on 429 and network errors
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            match self.client.get(url).send().await {
                Ok(resp) => {
                    if resp.status().is_success() {
                        if let Some(len) = resp.content_length() {
                            let max_bytes = (self.max_m3u_size_mb as u64) * 1024 * 1024;
                            if len > max_bytes {
                                bail!(
                                    "Playlist too large: {:.1}MB (limit {}MB)",
                                    len as f64 / 1024f64 / 1024f64,
                                    self.max_m3u_size_mb
                                );
                            }
                        }

                        return resp.text().await.context("failed to read playlist body");
                    }

                    let status = resp.status();
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS && attempt < self.max_retries {
                        let backoff_ms = backoff_ms(attempt);
                        tracing::warn!("fetch_retry" = attempt + 1, "reason" = "429", "backoff_ms" = backoff_ms);
                        sleep(Duration::from_millis(backoff_ms)).await;
                        continue;
                    }

                    let friendly: String = match status {
                        reqwest::StatusCode::NOT_FOUND => "Playlist not found (404). Check the URL.".to_string(),
                        reqwest::StatusCode::FORBIDDEN => "Access denied (403). The playlist may require authentication.".to_string(),
                        reqwest::StatusCode::TOO_MANY_REQUESTS => "Too many requests (429). The upstream server is rate limiting.".to_string(),
                        _ => {
                            let reason = status.canonical_reason().unwrap_or("Error");
                            format!("HTTP {}: {}", status.as_u16(), reason)
                        }
                    };

                    bail!("{}", friendly);
                }
                Err(err) => {
                    if attempt < self.max_retries {
                        let backoff_ms = backoff_ms(attempt);
                        tracing::warn!("fetch_retry" = attempt + 1, "reason" = "network", "backoff_ms" = backoff_ms);
                        last_err = Some(err);
                        sleep(Duration::from_millis(backoff_ms)).await;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }

        match last_err {
            Some(e) => Err(e.into()),
            None => Err(anyhow!("Unknown fetch error")),
        }
    }

    /// Read a playlist from a remote URL or a local path and parse it
    pub async fn load(&self, source: &str) -> Result<Vec<Track>> {
        let text = if is_remote(source) {
            tracing::info!("Fetching playlist: {}", source);
            self.fetch_text(source).await?
        } else {
            tracing::info!("Reading playlist file: {}", source);
            tokio::fs::read_to_string(source)
                .await
                .with_context(|| format!("failed to read playlist file {}", source))?
        };

        tracing::info!("Playlist size: {:.2} MB", text.len() as f64 / 1024.0 / 1024.0);

        Ok(parse(&text))
    }
}

fn backoff_ms(attempt: u32) -> u64 {
    1u64.checked_shl(attempt)
        .unwrap_or(u64::MAX)
        .saturating_mul(500)
        .min(10_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extinf() {
        let line = r#"#EXTINF:-1 tvg-id="globo" tvg-name="Globo HD" tvg-logo="http://logo.com/globo.png" group-title="TV",Globo HD"#;
        let extinf = parse_extinf(line).unwrap();

        assert_eq!(extinf.title, "Globo HD");
        assert_eq!(extinf.duration, -1);
        assert_eq!(extinf.tags.len(), 4);
        assert_eq!(extinf.tags[0], Tag::new("tvg-id", "globo"));
        assert_eq!(extinf.tags[3], Tag::new("group-title", "TV"));
    }

    #[test]
    fn test_parse_extinf_minimal() {
        let extinf = parse_extinf("#EXTINF:-1,Canal Teste").unwrap();

        assert_eq!(extinf.title, "Canal Teste");
        assert_eq!(extinf.duration, -1);
        assert!(extinf.tags.is_empty());
    }

    #[test]
    fn test_parse_extinf_comma_inside_attribute() {
        let line = r#"#EXTINF:0 group-title="News, World",CNN"#;
        let extinf = parse_extinf(line).unwrap();

        assert_eq!(extinf.title, "CNN");
        assert_eq!(extinf.duration, 0);
        assert_eq!(extinf.tags, vec![Tag::new("group-title", "News, World")]);
    }

    #[test]
    fn test_parse_extinf_fractional_duration() {
        let extinf = parse_extinf("#EXTINF:10.5,Clip").unwrap();
        assert_eq!(extinf.duration, 10);
    }

    #[test]
    fn test_parse_playlist() {
        let text = "#EXTM3U\n\
            #EXTINF:-1 tvg-id=\"s1\" group-title=\"Sports\",Sports1\n\
            #EXTVLCOPT:http-user-agent=VLC\n\
            http://up.example/live/10/20/300.ts\n\
            \n\
            #EXTINF:120,Movie\r\n\
            http://up.example/movie/1.mkv\n";

        let tracks = parse(text);

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].name, "Sports1");
        assert_eq!(tracks[0].uri, "http://up.example/live/10/20/300.ts");
        assert_eq!(tracks[0].tag("group-title"), Some("Sports"));
        assert_eq!(tracks[1].name, "Movie");
        assert_eq!(tracks[1].length, 120);
        assert_eq!(tracks[1].uri, "http://up.example/movie/1.mkv");
    }

    #[test]
    fn test_parse_bare_uri() {
        let tracks = parse("#EXTM3U\nhttp://up.example/a.ts\n");

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].name, "");
        assert_eq!(tracks[0].length, -1);
        assert!(tracks[0].tags.is_empty());
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse("").is_empty());
        assert!(parse("#EXTM3U\n").is_empty());
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(backoff_ms(0), 500);
        assert_eq!(backoff_ms(2), 2000);
        assert_eq!(backoff_ms(10), 10_000);
        assert_eq!(backoff_ms(64), 10_000);
        assert_eq!(backoff_ms(u32::MAX), 10_000);
    }

    #[tokio::test]
    async fn test_load_local_file() {
        let path = std::env::temp_dir().join(format!("{}.m3u", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "#EXTM3U\n#EXTINF:-1,Local\nhttp://up.example/1.ts\n")
            .await
            .unwrap();

        let parser = M3UParser::new("test", 1000, 0, 10).unwrap();
        let tracks = parser.load(path.to_str().unwrap()).await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].name, "Local");
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        let parser = M3UParser::new("test", 1000, 0, 10).unwrap();
        assert!(parser.load("/nonexistent/playlist.m3u").await.is_err());
    }
}
