use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, warn};

use crate::room::RoomRegistry;
use crate::router::{self, Relay, Routing};
use crate::session::{RoomId, SessionId};
use crate::signal::{ClientMessage, Outgoing, ServerMessage};

/// Per-connection outbound queue, drained by the socket writer task.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

// Shared server state: membership behind one writer lock, plus the table of
// live connections messages are delivered through.
#[derive(Clone, Default)]
pub struct AppState {
    registry: Arc<Mutex<RoomRegistry>>,
    connections: Arc<RwLock<HashMap<SessionId, Outbox>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a new connection and greets it with its id.
    pub async fn connect(&self, id: SessionId, outbox: Outbox) {
        let _ = outbox.send(ServerMessage::Welcome { id: id.clone() });
        self.connections.write().await.insert(id.clone(), outbox);
        self.registry.lock().await.connect(id);
    }

    /// Universal cleanup: leaves the room, notifies the rest, forgets the id.
    pub async fn disconnect(&self, id: &SessionId) {
        self.connections.write().await.remove(id);
        let out = self.registry.lock().await.disconnect(id);
        self.deliver(out).await;
    }

    /// Single dispatch point for everything a client can send.
    pub async fn handle_message(&self, sender: &SessionId, message: ClientMessage) {
        let out = {
            let mut registry = self.registry.lock().await;
            match message {
                ClientMessage::JoinRoom(request) => match registry.join(sender, &request) {
                    Ok(mut out) => {
                        let joined = registry.session(sender).and_then(|s| s.room_id.clone());
                        if let Some(room_id) = joined {
                            let ack = ServerMessage::Joined { room_id };
                            out.insert(0, Outgoing::new(sender.clone(), ack));
                        }
                        out
                    }
                    Err(e) => {
                        warn!("join from {} rejected: {}", sender.short(), e);
                        Vec::new()
                    }
                },
                ClientMessage::Offer { offer, target } => {
                    routed(router::route(&registry, sender, &target, Relay::Offer(offer)))
                }
                ClientMessage::Answer { answer, target } => {
                    routed(router::route(&registry, sender, &target, Relay::Answer(answer)))
                }
                ClientMessage::IceCandidate { candidate, target } => {
                    routed(router::route(&registry, sender, &target, Relay::Candidate(candidate)))
                }
                ClientMessage::CameraToggle {
                    room_id,
                    is_camera_off,
                } => router::broadcast_camera_toggle(&mut registry, sender, &room_id, is_camera_off)
                    .unwrap_or_default(),
            }
        };
        self.deliver(out).await;
    }

    /// Fire-and-forget; targets without a live connection are skipped.
    async fn deliver(&self, out: Vec<Outgoing>) {
        if out.is_empty() {
            return;
        }
        let connections = self.connections.read().await;
        for Outgoing { target, message } in out {
            match connections.get(&target) {
                Some(outbox) => {
                    debug!("-> {} {}", target.short(), message.kind());
                    let _ = outbox.send(message);
                }
                None => debug!("target {} unreachable, dropping {}", target.short(), message.kind()),
            }
        }
    }

    pub async fn members_of(&self, room: &str) -> Vec<SessionId> {
        match RoomId::parse(room) {
            Ok(room) => self.registry.lock().await.members(&room),
            Err(_) => Vec::new(),
        }
    }

    pub async fn room_count(&self) -> usize {
        self.registry.lock().await.room_count()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

fn routed(routing: Routing) -> Vec<Outgoing> {
    match routing {
        Routing::Deliver(out) => vec![out],
        Routing::Dropped(_) => Vec::new(),
    }
}
