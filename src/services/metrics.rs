//! Prometheus counters, registered in the default registry and exposed on /metrics

use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

use crate::services::serializer::Serialized;

lazy_static! {
    pub static ref TRACKS_WRITTEN: IntCounter = register_int_counter!(
        "iptv_proxy_tracks_written_total",
        "Tracks written to proxied playlists"
    )
    .unwrap();
    pub static ref TRACKS_EXCLUDED: IntCounter = register_int_counter!(
        "iptv_proxy_tracks_excluded_total",
        "Tracks dropped by exclusion rules"
    )
    .unwrap();
    pub static ref TRACK_REWRITE_FAILURES: IntCounter = register_int_counter!(
        "iptv_proxy_track_rewrite_failures_total",
        "Tracks dropped because their URI could not be rewritten"
    )
    .unwrap();
    pub static ref STREAM_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "iptv_proxy_stream_requests_total",
        "Proxied stream requests by kind",
        &["kind"]
    )
    .unwrap();
}

/// Record the outcome of one serialization pass
pub fn record_pass(out: &Serialized) {
    TRACKS_WRITTEN.inc_by(out.written() as u64);
    TRACKS_EXCLUDED.inc_by(out.excluded as u64);
    TRACK_REWRITE_FAILURES.inc_by(out.failed as u64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Track;

    #[test]
    fn test_record_pass_increments_counters() {
        let written = TRACKS_WRITTEN.get();
        let excluded = TRACKS_EXCLUDED.get();

        record_pass(&Serialized {
            playlist: vec![Track::new("A", "http://a/1.ts")],
            excluded: 2,
            ..Default::default()
        });

        assert!(TRACKS_WRITTEN.get() >= written + 1);
        assert!(TRACKS_EXCLUDED.get() >= excluded + 2);
    }
}
