//! Recording mocks for the media and negotiation seams.
#![allow(dead_code)]

use async_trait::async_trait;
use meshroom::client::{
    CandidateSink, LinkState, LocalMedia, MediaSource, MediaTrack, PeerConnection, PeerConnector,
};
use meshroom::signal::{IceCandidate, SdpKind, SessionDescription};
use meshroom::{Error, Result, SessionId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

pub const INCOMPATIBLE: &str = "incompatible";

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    AttachMedia(usize),
    CreateOffer,
    CreateAnswer,
    SetLocal(SdpKind),
    SetRemote(SdpKind, String),
    AddCandidate(String),
    Close,
}

type OpLog = Arc<Mutex<HashMap<SessionId, Vec<Op>>>>;

/// Hands out [`MockConnection`]s that log every call per remote.
#[derive(Clone, Default)]
pub struct MockConnector {
    label: String,
    ops: OpLog,
    local_candidates: Vec<String>,
}

impl MockConnector {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Default::default()
        }
    }

    /// Candidates "discovered" whenever a local description is applied.
    pub fn with_local_candidates(mut self, candidates: &[&str]) -> Self {
        self.local_candidates = candidates.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn ops(&self, remote: &str) -> Vec<Op> {
        self.ops
            .lock()
            .unwrap()
            .get(&SessionId::from(remote))
            .cloned()
            .unwrap_or_default()
    }

    pub fn remotes(&self) -> Vec<SessionId> {
        let mut remotes: Vec<SessionId> = self.ops.lock().unwrap().keys().cloned().collect();
        remotes.sort();
        remotes
    }
}

#[async_trait]
impl PeerConnector for MockConnector {
    async fn open(&self, remote: &SessionId, candidates: CandidateSink) -> Result<Box<dyn PeerConnection>> {
        self.ops.lock().unwrap().entry(remote.clone()).or_default();
        Ok(Box::new(MockConnection {
            label: self.label.clone(),
            remote: remote.clone(),
            ops: Arc::clone(&self.ops),
            sink: candidates,
            local_candidates: self.local_candidates.clone(),
        }))
    }
}

pub struct MockConnection {
    label: String,
    remote: SessionId,
    ops: OpLog,
    sink: CandidateSink,
    local_candidates: Vec<String>,
}

impl MockConnection {
    fn record(&self, op: Op) {
        self.ops
            .lock()
            .unwrap()
            .entry(self.remote.clone())
            .or_default()
            .push(op);
    }
}

#[async_trait]
impl PeerConnection for MockConnection {
    async fn attach_media(&self, tracks: &[Arc<MediaTrack>]) -> Result<()> {
        self.record(Op::AttachMedia(tracks.len()));
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.record(Op::CreateOffer);
        Ok(SessionDescription::offer(format!("offer:{}->{}", self.label, self.remote)))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.record(Op::CreateAnswer);
        Ok(SessionDescription::answer(format!("answer:{}->{}", self.label, self.remote)))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.record(Op::SetLocal(description.kind));
        for candidate in &self.local_candidates {
            self.sink.send(&IceCandidate::new(candidate.clone()));
        }
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        if description.sdp.contains(INCOMPATIBLE) {
            return Err(Error::PeerConnection("incompatible description".into()));
        }
        self.record(Op::SetRemote(description.kind, description.sdp));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.record(Op::AddCandidate(candidate.candidate));
        Ok(())
    }

    async fn close(&self) {
        self.record(Op::Close);
    }
}

/// Grants audio+video, or refuses like a denied permission prompt.
pub struct MockMedia {
    pub deny: bool,
}

#[async_trait]
impl MediaSource for MockMedia {
    async fn capture(&self) -> Result<LocalMedia> {
        if self.deny {
            return Err(Error::MediaAccessDenied("permission prompt dismissed".into()));
        }
        Ok(LocalMedia::audio_video())
    }
}

pub async fn wait_for_state(mut rx: watch::Receiver<LinkState>, want: LinkState) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|state| *state == want))
        .await
        .unwrap_or_else(|_| panic!("link never reached {want:?}"))
        .unwrap_or_else(|_| panic!("link dropped before reaching {want:?}"));
}

pub async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("channel closed")
}

/// Everything currently queued, without waiting.
pub fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

/// Polls `check` until it holds, failing after five seconds.
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
