//! Seams to the connection-negotiation primitive.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::warn;

use crate::client::media::MediaTrack;
use crate::error::Result;
use crate::session::SessionId;
use crate::signal::{ClientMessage, IceCandidate, SessionDescription};

#[derive(Debug, Default)]
struct Gate {
    open: bool,
    held: Vec<serde_json::Value>,
}

/// Where a connection reports locally discovered candidates.
///
/// Candidates go out as `ice-candidate` as soon as they are found. The only
/// exception is the window before this side's offer or answer is on the
/// wire: the remote has no link to apply them to yet, so they are held and
/// released in discovery order right after the description is sent.
#[derive(Debug, Clone)]
pub struct CandidateSink {
    remote: SessionId,
    signals: mpsc::UnboundedSender<ClientMessage>,
    gate: Arc<Mutex<Gate>>,
}

impl CandidateSink {
    pub fn new(remote: SessionId, signals: mpsc::UnboundedSender<ClientMessage>) -> Self {
        Self {
            remote,
            signals,
            gate: Arc::new(Mutex::new(Gate::default())),
        }
    }

    pub fn remote(&self) -> &SessionId {
        &self.remote
    }

    /// Returns false once the signaling channel is gone.
    pub fn send(&self, candidate: &IceCandidate) -> bool {
        let candidate = match serde_json::to_value(candidate) {
            Ok(value) => value,
            Err(e) => {
                warn!("unable to encode local candidate: {}", e);
                return false;
            }
        };
        let mut gate = self.lock();
        if !gate.open {
            gate.held.push(candidate);
            return !self.signals.is_closed();
        }
        self.forward(candidate)
    }

    /// Opens the gate and flushes anything held so far.
    pub(crate) fn release(&self) {
        let mut gate = self.lock();
        gate.open = true;
        for candidate in std::mem::take(&mut gate.held) {
            self.forward(candidate);
        }
    }

    fn forward(&self, candidate: serde_json::Value) -> bool {
        self.signals
            .send(ClientMessage::IceCandidate {
                candidate,
                target: self.remote.clone(),
            })
            .is_ok()
    }

    fn lock(&self) -> MutexGuard<'_, Gate> {
        match self.gate.lock() {
            Ok(gate) => gate,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// One negotiated connection toward one remote.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Adds outgoing tracks; the same track objects are shared across links.
    async fn attach_media(&self, tracks: &[Arc<MediaTrack>]) -> Result<()>;

    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn close(&self);
}

/// Factory for [`PeerConnection`]s.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn open(&self, remote: &SessionId, candidates: CandidateSink) -> Result<Box<dyn PeerConnection>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_are_held_until_release() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = CandidateSink::new(SessionId::from("B"), tx);

        assert!(sink.send(&IceCandidate::new("c1")));
        assert!(sink.send(&IceCandidate::new("c2")));
        assert!(rx.try_recv().is_err());

        sink.release();
        assert!(sink.send(&IceCandidate::new("c3")));

        let received: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|msg| match msg {
                ClientMessage::IceCandidate { candidate, target } => {
                    assert_eq!(target, SessionId::from("B"));
                    candidate["candidate"].as_str().unwrap().to_string()
                }
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(received, vec!["c1", "c2", "c3"]);
    }
}
