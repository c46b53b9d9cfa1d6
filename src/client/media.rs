//! Local capture handle and its enable flags.
//!
//! Tracks are reference counted and shared by every link they are attached
//! to, so flipping a flag is seen by all links at once.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug)]
pub struct MediaTrack {
    id: String,
    kind: TrackKind,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl MediaTrack {
    pub fn new(kind: TrackKind) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            kind,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.enabled.store(false, Ordering::SeqCst);
    }
}

/// A granted capture: the set of local tracks.
#[derive(Debug, Clone, Default)]
pub struct LocalMedia {
    tracks: Vec<Arc<MediaTrack>>,
}

impl LocalMedia {
    pub fn new(tracks: Vec<Arc<MediaTrack>>) -> Self {
        Self { tracks }
    }

    /// One audio and one video track.
    pub fn audio_video() -> Self {
        Self::new(vec![MediaTrack::new(TrackKind::Audio), MediaTrack::new(TrackKind::Video)])
    }

    pub fn tracks(&self) -> &[Arc<MediaTrack>] {
        &self.tracks
    }

    pub fn set_audio_enabled(&self, enabled: bool) {
        self.set_enabled(TrackKind::Audio, enabled);
    }

    pub fn set_video_enabled(&self, enabled: bool) {
        self.set_enabled(TrackKind::Video, enabled);
    }

    pub fn is_muted(&self) -> bool {
        !self.any_enabled(TrackKind::Audio)
    }

    pub fn is_camera_off(&self) -> bool {
        !self.any_enabled(TrackKind::Video)
    }

    /// Stops every track. Stopped tracks stay disabled.
    pub fn release(&self) {
        for track in &self.tracks {
            track.stop();
        }
        info!("released {} local tracks", self.tracks.len());
    }

    fn set_enabled(&self, kind: TrackKind, enabled: bool) {
        self.tracks
            .iter()
            .filter(|t| t.kind() == kind && !t.is_stopped())
            .for_each(|t| t.set_enabled(enabled));
    }

    fn any_enabled(&self, kind: TrackKind) -> bool {
        self.tracks.iter().any(|t| t.kind() == kind && t.is_enabled())
    }
}

/// Capture collaborator. Fails with [`crate::Error::MediaAccessDenied`].
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn capture(&self) -> Result<LocalMedia>;
}

/// Grants audio+video tracks without touching any device. Useful for headless
/// peers whose frames are produced elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedMedia;

#[async_trait]
impl MediaSource for DetachedMedia {
    async fn capture(&self) -> Result<LocalMedia> {
        Ok(LocalMedia::audio_video())
    }
}
