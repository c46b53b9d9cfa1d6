//! Per-remote negotiation state machine.
//!
//! Each [`PeerLink`] lives inside its own task and consumes an ordered queue
//! of [`LinkEvent`]s, so a slow description exchange with one remote never
//! holds up another.

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::client::media::MediaTrack;
use crate::client::negotiation::{CandidateSink, PeerConnection, PeerConnector};
use crate::client::presence::PresenceObserver;
use crate::error::{Error, Result};
use crate::session::SessionId;
use crate::signal::{ClientMessage, IceCandidate, SdpKind, SessionDescription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Was in the room first; sends the offer.
    Initiator,
    /// Joined later; answers.
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    Negotiating,
    Connected,
    /// Terminal.
    Closed,
}

#[derive(Debug)]
pub(crate) enum LinkEvent {
    Answer(Value),
    Candidate(Value),
    Close,
}

#[derive(Debug)]
pub(crate) enum Opening {
    Initiate,
    Respond(Value),
}

pub struct PeerLink {
    remote_id: SessionId,
    role: Role,
    state: LinkState,
    local_media_attached: bool,
    remote_description_set: bool,
    pending_remote_candidates: VecDeque<IceCandidate>,
    connection: Box<dyn PeerConnection>,
    candidates: CandidateSink,
    signals: mpsc::UnboundedSender<ClientMessage>,
    state_tx: watch::Sender<LinkState>,
    observer: Arc<dyn PresenceObserver>,
}

impl PeerLink {
    fn new(
        remote_id: SessionId,
        role: Role,
        connection: Box<dyn PeerConnection>,
        candidates: CandidateSink,
        signals: mpsc::UnboundedSender<ClientMessage>,
        state_tx: watch::Sender<LinkState>,
        observer: Arc<dyn PresenceObserver>,
    ) -> Self {
        Self {
            remote_id,
            role,
            state: LinkState::New,
            local_media_attached: false,
            remote_description_set: false,
            pending_remote_candidates: VecDeque::new(),
            connection,
            candidates,
            signals,
            state_tx,
            observer,
        }
    }

    pub fn remote_id(&self) -> &SessionId {
        &self.remote_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn local_media_attached(&self) -> bool {
        self.local_media_attached
    }

    fn set_state(&mut self, state: LinkState) {
        if self.state == state {
            return;
        }
        debug!("link {} {:?} -> {:?}", self.remote_id.short(), self.state, state);
        self.state = state;
        self.state_tx.send_replace(state);
        self.observer.link_state_changed(&self.remote_id, state);
    }

    fn failure(&self, reason: impl ToString) -> Error {
        Error::Negotiation {
            remote: self.remote_id.clone(),
            reason: reason.to_string(),
        }
    }

    async fn open(&mut self, tracks: &[Arc<MediaTrack>], opening: Opening) -> Result<()> {
        if !tracks.is_empty() {
            self.connection
                .attach_media(tracks)
                .await
                .map_err(|e| self.failure(e))?;
            self.local_media_attached = true;
        }
        match opening {
            Opening::Initiate => self.start_offer().await,
            Opening::Respond(offer) => self.accept_offer(offer).await,
        }
    }

    async fn start_offer(&mut self) -> Result<()> {
        let offer = self.connection.create_offer().await.map_err(|e| self.failure(e))?;
        self.connection
            .set_local_description(offer.clone())
            .await
            .map_err(|e| self.failure(e))?;
        self.set_state(LinkState::Negotiating);
        self.send(ClientMessage::Offer {
            offer: serde_json::to_value(&offer)?,
            target: self.remote_id.clone(),
        })?;
        self.candidates.release();
        Ok(())
    }

    async fn accept_offer(&mut self, offer: Value) -> Result<()> {
        let offer = self.decode(offer, SdpKind::Offer)?;
        self.apply_remote(offer).await?;

        let answer = self.connection.create_answer().await.map_err(|e| self.failure(e))?;
        self.connection
            .set_local_description(answer.clone())
            .await
            .map_err(|e| self.failure(e))?;
        self.set_state(LinkState::Negotiating);
        self.send(ClientMessage::Answer {
            answer: serde_json::to_value(&answer)?,
            target: self.remote_id.clone(),
        })?;
        self.candidates.release();
        self.set_state(LinkState::Connected);
        Ok(())
    }

    async fn apply_answer(&mut self, answer: Value) -> Result<()> {
        if self.role != Role::Initiator || self.state != LinkState::Negotiating {
            warn!(
                "unexpected answer from {} while {:?} as {:?}, ignoring",
                self.remote_id.short(),
                self.state,
                self.role
            );
            return Ok(());
        }
        let answer = self.decode(answer, SdpKind::Answer)?;
        self.apply_remote(answer).await?;
        self.set_state(LinkState::Connected);
        Ok(())
    }

    async fn apply_remote(&mut self, description: SessionDescription) -> Result<()> {
        self.connection
            .set_remote_description(description)
            .await
            .map_err(|e| self.failure(e))?;
        self.remote_description_set = true;

        if !self.pending_remote_candidates.is_empty() {
            debug!(
                "flushing {} buffered candidates for {}",
                self.pending_remote_candidates.len(),
                self.remote_id.short()
            );
        }
        while let Some(candidate) = self.pending_remote_candidates.pop_front() {
            self.add_candidate(candidate).await;
        }
        Ok(())
    }

    /// Buffers until a remote description exists. Bad candidates are skipped.
    async fn add_remote_candidate(&mut self, candidate: Value) {
        let candidate: IceCandidate = match serde_json::from_value(candidate) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!("malformed candidate from {}: {}", self.remote_id.short(), e);
                return;
            }
        };
        if self.remote_description_set {
            self.add_candidate(candidate).await;
        } else {
            self.pending_remote_candidates.push_back(candidate);
        }
    }

    async fn add_candidate(&self, candidate: IceCandidate) {
        if let Err(e) = self.connection.add_ice_candidate(candidate).await {
            warn!("candidate from {} rejected: {}", self.remote_id.short(), e);
        }
    }

    async fn close(&mut self) {
        if self.state == LinkState::Closed {
            return;
        }
        self.connection.close().await;
        self.pending_remote_candidates.clear();
        self.set_state(LinkState::Closed);
    }

    fn decode(&self, value: Value, expected: SdpKind) -> Result<SessionDescription> {
        let description: SessionDescription =
            serde_json::from_value(value).map_err(|e| self.failure(format!("malformed description: {e}")))?;
        if description.kind != expected {
            return Err(self.failure(format!("expected {:?}, got {:?}", expected, description.kind)));
        }
        Ok(description)
    }

    fn send(&self, message: ClientMessage) -> Result<()> {
        self.signals
            .send(message)
            .map_err(|_| Error::Signaling("signaling channel closed".to_string()))
    }
}

/// Everything a link task needs; built by the manager.
pub(crate) struct LinkTask {
    pub remote_id: SessionId,
    pub role: Role,
    pub connector: Arc<dyn PeerConnector>,
    pub tracks: Vec<Arc<MediaTrack>>,
    pub signals: mpsc::UnboundedSender<ClientMessage>,
    pub state_tx: watch::Sender<LinkState>,
    pub observer: Arc<dyn PresenceObserver>,
    pub negotiation_timeout: Option<Duration>,
}

impl LinkTask {
    pub(crate) async fn run(self, opening: Opening, mut events: mpsc::UnboundedReceiver<LinkEvent>) {
        let deadline = self.negotiation_timeout.map(|t| Instant::now() + t);
        let sink = CandidateSink::new(self.remote_id.clone(), self.signals.clone());

        let connection = match self.connector.open(&self.remote_id, sink.clone()).await {
            Ok(connection) => connection,
            Err(e) => {
                warn!("could not open connection to {}: {}", self.remote_id.short(), e);
                self.state_tx.send_replace(LinkState::Closed);
                self.observer.link_state_changed(&self.remote_id, LinkState::Closed);
                return;
            }
        };

        let mut link = PeerLink::new(
            self.remote_id,
            self.role,
            connection,
            sink,
            self.signals,
            self.state_tx,
            self.observer,
        );
        info!("link to {} opened as {:?}", link.remote_id().short(), link.role());

        if let Err(e) = link.open(&self.tracks, opening).await {
            warn!("{}", e);
            link.close().await;
            return;
        }
        if !link.local_media_attached() {
            debug!("link to {} carries no local media", link.remote_id().short());
        }

        loop {
            let next = match (link.state(), deadline) {
                (LinkState::Negotiating, Some(deadline)) => match timeout_at(deadline, events.recv()).await {
                    Ok(event) => event,
                    Err(_) => {
                        warn!("negotiation with {} timed out", link.remote_id().short());
                        break;
                    }
                },
                _ => events.recv().await,
            };
            let Some(event) = next else { break };

            let result = match event {
                LinkEvent::Answer(answer) => link.apply_answer(answer).await,
                LinkEvent::Candidate(candidate) => {
                    link.add_remote_candidate(candidate).await;
                    Ok(())
                }
                LinkEvent::Close => break,
            };
            if let Err(e) = result {
                warn!("{}", e);
                break;
            }
        }

        link.close().await;
    }
}
