//! Remote video tracks and the render sink they are handed to

use parking_lot::Mutex;
use tracing::{debug, info};

/// Remote video track as seen by the render sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVideoTrack {
    /// Track identifier
    pub id: String,
    /// Media stream the track belongs to
    pub stream_id: String,
    /// Negotiated codec MIME type (e.g. `video/VP8`)
    pub mime_type: String,
}

/// Consumer of remote video tracks (e.g. a window compositor)
pub trait RenderSink: Send + Sync {
    /// A remote video track started
    fn add_track(&self, track: &RemoteVideoTrack);

    /// A remote video track ended or its connection was released
    fn remove_track(&self, track: &RemoteVideoTrack);
}

/// Render sink that only logs track changes
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRenderSink;

impl RenderSink for LoggingRenderSink {
    fn add_track(&self, track: &RemoteVideoTrack) {
        info!(
            track_id = %track.id,
            stream_id = %track.stream_id,
            "Video track added ({})", track.mime_type
        );
    }

    fn remove_track(&self, track: &RemoteVideoTrack) {
        info!(track_id = %track.id, "Video track removed");
    }
}

/// Tracks handed to a render sink by one peer connection
///
/// A connection can be released before the engine reports its tracks ended,
/// so the registry remembers what the sink received and can withdraw it all.
#[derive(Debug, Default)]
pub struct TrackRegistry {
    tracks: Mutex<Vec<RemoteVideoTrack>>,
}

impl TrackRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `track` and hand it to `sink`; duplicates are ignored
    pub fn add(&self, track: RemoteVideoTrack, sink: &dyn RenderSink) -> bool {
        {
            let mut tracks = self.tracks.lock();
            if tracks.iter().any(|t| t.id == track.id) {
                debug!(track_id = %track.id, "Video track already registered");
                return false;
            }
            tracks.push(track.clone());
        }
        sink.add_track(&track);
        true
    }

    /// Withdraw the track with `track_id` from `sink`
    pub fn remove(&self, track_id: &str, sink: &dyn RenderSink) -> bool {
        let removed = {
            let mut tracks = self.tracks.lock();
            tracks
                .iter()
                .position(|t| t.id == track_id)
                .map(|index| tracks.remove(index))
        };

        match removed {
            Some(track) => {
                sink.remove_track(&track);
                true
            }
            None => false,
        }
    }

    /// Withdraw every registered track from `sink`; returns how many were removed
    pub fn clear_all(&self, sink: &dyn RenderSink) -> usize {
        let drained: Vec<RemoteVideoTrack> = self.tracks.lock().drain(..).collect();
        for track in &drained {
            sink.remove_track(track);
        }
        drained.len()
    }

    /// Number of registered tracks
    pub fn len(&self) -> usize {
        self.tracks.lock().len()
    }

    /// Whether no track is registered
    pub fn is_empty(&self) -> bool {
        self.tracks.lock().is_empty()
    }
}
