//! Turns routed signaling messages into one [`PeerLink`] per remote.
//!
//! [`PeerLinkManager::handle`] is the single client-side dispatch point.
//! Roles follow from the triggering event: `user-connected` makes this side
//! the initiator, an `offer` from an unknown remote makes it the responder.
//! Link triggers only count once the server has confirmed the current room
//! with `joined`; anything earlier still belongs to the previous room.
//!
//! [`PeerLink`]: crate::client::link::PeerLink

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::link::{LinkEvent, LinkState, LinkTask, Opening, Role};
use crate::client::media::LocalMedia;
use crate::client::negotiation::PeerConnector;
use crate::client::presence::{NoopObserver, PresenceObserver};
use crate::error::{Error, Result};
use crate::session::{RoomId, SessionId};
use crate::signal::{ClientMessage, JoinRoom, ServerMessage};

struct LinkHandle {
    role: Role,
    events: mpsc::UnboundedSender<LinkEvent>,
    state: watch::Receiver<LinkState>,
    task: JoinHandle<()>,
}

/// Snapshot of one link, as seen from the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    pub remote_id: SessionId,
    pub role: Role,
    pub state: LinkState,
}

pub struct PeerLinkManager {
    local_id: Option<SessionId>,
    room: Option<RoomId>,
    room_confirmed: bool,
    connector: Arc<dyn PeerConnector>,
    media: Option<LocalMedia>,
    media_released: bool,
    signals: mpsc::UnboundedSender<ClientMessage>,
    observer: Arc<dyn PresenceObserver>,
    negotiation_timeout: Option<Duration>,
    links: HashMap<SessionId, LinkHandle>,
}

impl PeerLinkManager {
    pub fn new(
        connector: Arc<dyn PeerConnector>,
        signals: mpsc::UnboundedSender<ClientMessage>,
        media: Option<LocalMedia>,
    ) -> Self {
        Self {
            local_id: None,
            room: None,
            room_confirmed: false,
            connector,
            media,
            media_released: false,
            signals,
            observer: Arc::new(NoopObserver),
            negotiation_timeout: None,
            links: HashMap::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PresenceObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_negotiation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.negotiation_timeout = timeout;
        self
    }

    /// Id assigned by the server, once `welcome` has arrived.
    pub fn local_id(&self) -> Option<&SessionId> {
        self.local_id.as_ref()
    }

    pub fn room(&self) -> Option<&RoomId> {
        self.room.as_ref()
    }

    pub fn media(&self) -> Option<&LocalMedia> {
        self.media.as_ref()
    }

    /// Hands over a new capture, e.g. before joining again after [`leave`].
    ///
    /// [`leave`]: PeerLinkManager::leave
    pub fn set_media(&mut self, media: LocalMedia) {
        if let Some(old) = self.media.replace(media) {
            old.release();
        }
        self.media_released = false;
    }

    /// Sends `join-room`. Links from a previous room are closed first.
    ///
    /// Fails with [`Error::MediaReleased`] when the capture was released by
    /// [`leave`](PeerLinkManager::leave) and nothing replaced it.
    pub async fn join(&mut self, request: JoinRoom) -> Result<()> {
        let (room, _) = request.resolve()?;
        if self.media_released {
            return Err(Error::MediaReleased);
        }
        if self.room.is_some() {
            self.close_all_links().await;
        }
        self.signals
            .send(ClientMessage::JoinRoom(request))
            .map_err(|_| Error::Signaling("signaling channel closed".to_string()))?;
        info!("joining room {}", room);
        self.room = Some(room);
        self.room_confirmed = false;
        Ok(())
    }

    pub fn handle(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Welcome { id } => {
                debug!("assigned session id {}", id);
                self.local_id = Some(id);
            }
            ServerMessage::Joined { room_id } => {
                if self.room.as_ref() == Some(&room_id) {
                    debug!("room {} confirmed", room_id);
                    self.room_confirmed = true;
                } else {
                    debug!("stale confirmation for room {}, ignoring", room_id);
                }
            }
            ServerMessage::UserConnected { id, name } => {
                self.observer.member_joined(&id, &name);
                self.open_link(id, Opening::Initiate);
            }
            ServerMessage::UserDisconnected { id, name } => {
                self.drop_link(&id);
                self.observer.member_left(&id, &name);
            }
            ServerMessage::Offer { offer, sender } => self.open_link(sender, Opening::Respond(offer)),
            ServerMessage::Answer { answer, sender } => self.forward(&sender, LinkEvent::Answer(answer)),
            ServerMessage::IceCandidate { candidate, sender } => {
                self.forward(&sender, LinkEvent::Candidate(candidate))
            }
            ServerMessage::CameraToggled {
                user_id,
                is_camera_off,
                name,
            } => self.observer.camera_toggled(&user_id, is_camera_off, &name),
        }
    }

    fn open_link(&mut self, remote_id: SessionId, opening: Opening) {
        if self.room.is_none() || !self.room_confirmed {
            debug!("no confirmed room, ignoring link trigger from {}", remote_id.short());
            return;
        }
        if self.local_id.as_ref() == Some(&remote_id) {
            warn!("ignoring link trigger naming ourselves");
            return;
        }
        if let Some(existing) = self.links.get(&remote_id) {
            warn!(
                "link to {} already exists as {:?}, ignoring duplicate trigger",
                remote_id.short(),
                existing.role
            );
            return;
        }

        let role = match opening {
            Opening::Initiate => Role::Initiator,
            Opening::Respond(_) => Role::Responder,
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(LinkState::New);
        let task = LinkTask {
            remote_id: remote_id.clone(),
            role,
            connector: Arc::clone(&self.connector),
            tracks: self
                .media
                .as_ref()
                .map(|media| media.tracks().to_vec())
                .unwrap_or_default(),
            signals: self.signals.clone(),
            state_tx,
            observer: Arc::clone(&self.observer),
            negotiation_timeout: self.negotiation_timeout,
        };
        let task = tokio::spawn(task.run(opening, events_rx));

        self.links.insert(
            remote_id,
            LinkHandle {
                role,
                events: events_tx,
                state: state_rx,
                task,
            },
        );
    }

    fn forward(&self, remote_id: &SessionId, event: LinkEvent) {
        if !self.room_confirmed {
            debug!("no confirmed room, dropping {:?} from {}", event, remote_id.short());
            return;
        }
        match self.links.get(remote_id) {
            // A failed link has dropped its queue; the send error is expected.
            Some(link) => {
                let _ = link.events.send(event);
            }
            None => debug!("no link to {}, dropping {:?}", remote_id.short(), event),
        }
    }

    fn drop_link(&mut self, remote_id: &SessionId) {
        if let Some(link) = self.links.remove(remote_id) {
            let _ = link.events.send(LinkEvent::Close);
            debug!("closing link to {}", remote_id.short());
        }
    }

    async fn close_all_links(&mut self) {
        for (remote_id, link) in self.links.drain() {
            let _ = link.events.send(LinkEvent::Close);
            if let Err(e) = link.task.await {
                warn!("link task for {} ended abnormally: {}", remote_id.short(), e);
            }
        }
    }

    /// Closes every link, waits for each to finish, releases local media.
    /// Safe to call more than once.
    pub async fn leave(&mut self) {
        self.close_all_links().await;
        if let Some(media) = self.media.take() {
            media.release();
            self.media_released = true;
        }
        self.room_confirmed = false;
        if let Some(room) = self.room.take() {
            info!("left room {}", room);
        }
    }

    /// Toggles local video and tells the room.
    pub fn set_camera_off(&mut self, off: bool) -> Result<()> {
        let room = self.room.as_ref().ok_or(Error::NotJoined)?;
        if let Some(media) = &self.media {
            media.set_video_enabled(!off);
        }
        self.signals
            .send(ClientMessage::CameraToggle {
                room_id: room.as_str().to_string(),
                is_camera_off: off,
            })
            .map_err(|_| Error::Signaling("signaling channel closed".to_string()))
    }

    /// Mute is local only; the server does not track it.
    pub fn set_muted(&mut self, muted: bool) {
        if let Some(media) = &self.media {
            media.set_audio_enabled(!muted);
        }
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn link(&self, remote_id: &SessionId) -> Option<LinkInfo> {
        self.links.get(remote_id).map(|link| LinkInfo {
            remote_id: remote_id.clone(),
            role: link.role,
            state: *link.state.borrow(),
        })
    }

    pub fn links(&self) -> Vec<LinkInfo> {
        let mut links: Vec<LinkInfo> = self
            .links
            .iter()
            .map(|(remote_id, link)| LinkInfo {
                remote_id: remote_id.clone(),
                role: link.role,
                state: *link.state.borrow(),
            })
            .collect();
        links.sort_by(|a, b| a.remote_id.cmp(&b.remote_id));
        links
    }

    /// Watch for a link's state; `None` when there is no such link.
    pub fn watch_link(&self, remote_id: &SessionId) -> Option<watch::Receiver<LinkState>> {
        self.links.get(remote_id).map(|link| link.state.clone())
    }
}
