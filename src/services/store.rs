//! Published proxied playlist
//!
//! Holds the output of the latest successful serialization pass. A refresh
//! builds the next playlist off to the side and swaps the `Arc` only once the
//! file has been written, so readers see either the old or the new pass.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time;

use crate::error::PlaylistError;
use crate::models::Playlist;
use crate::services::exclusion::ExclusionRules;
use crate::services::m3u_parser::M3UParser;
use crate::services::metrics;
use crate::services::rewriter::{ProxyRewriteConfig, RewriteMode};
use crate::services::serializer::{serialize_into, Serialized};
use crate::AppState;

/// Text and filtered tracks from the same pass
#[derive(Debug, Clone)]
pub struct ProxiedPlaylist {
    pub text: String,
    pub tracks: Playlist,
}

pub struct PlaylistStore {
    current: RwLock<Option<Arc<ProxiedPlaylist>>>,
    output_path: PathBuf,
}

impl PlaylistStore {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            current: RwLock::new(None),
            output_path: output_path.into(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Latest published playlist, `None` until the first refresh succeeds
    pub async fn current(&self) -> Option<Arc<ProxiedPlaylist>> {
        self.current.read().await.clone()
    }

    pub async fn publish(&self, playlist: ProxiedPlaylist) {
        *self.current.write().await = Some(Arc::new(playlist));
    }

    /// Load `source`, rewrite it in generic mode, write the file and publish
    /// Returns the number of tracks written.
    pub async fn refresh(
        &self,
        parser: &M3UParser,
        source: &str,
        rules: &ExclusionRules,
        config: &ProxyRewriteConfig,
    ) -> Result<usize> {
        let tracks = parser.load(source).await?;
        let total = tracks.len();

        let path = self.output_path.clone();
        let rules = rules.clone();
        let config = config.clone();
        let out = tokio::task::spawn_blocking(move || write_atomically(&path, tracks, &rules, &config))
            .await
            .context("playlist writer task failed")??;

        metrics::record_pass(&out);
        let written = out.written();

        tracing::info!(
            "Proxied playlist written to {}: {} of {} tracks ({} excluded, {} failed)",
            self.output_path.display(),
            written,
            total,
            out.excluded,
            out.failed
        );

        self.publish(ProxiedPlaylist {
            text: out.text,
            tracks: out.playlist,
        })
        .await;

        Ok(written)
    }
}

/// Serialize into `<path>.tmp`, sync, then rename over `path`
fn write_atomically(
    path: &Path,
    tracks: Playlist,
    rules: &ExclusionRules,
    config: &ProxyRewriteConfig,
) -> Result<Serialized, PlaylistError> {
    let tmp = path.with_extension("tmp");
    let written = (|| -> Result<Serialized, PlaylistError> {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        let out = serialize_into(tracks, rules, config, RewriteMode::Generic, &mut writer)?;
        writer.get_ref().sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(out)
    })();

    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

/// Start the background refresh task
///
/// The first refresh runs at startup, so this waits one interval before
/// refreshing. Should be spawned with `tokio::spawn`.
pub async fn start_refresh_task(state: Arc<AppState>, interval_secs: u64) {
    let Some(source) = state.config.m3u_url.clone() else {
        return;
    };

    tracing::info!("Starting playlist refresh task (interval: {}s)", interval_secs);

    let mut interval = time::interval(Duration::from_secs(interval_secs));
    interval.tick().await;

    loop {
        interval.tick().await;

        if let Err(e) = state
            .store
            .refresh(&state.parser, &source, &state.rules, &state.rewrite)
            .await
        {
            tracing::warn!("Playlist refresh failed, keeping previous playlist: {:#}", e);
        }
    }
}
