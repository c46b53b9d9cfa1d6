//! Addressed relay of negotiation messages.
//!
//! Payloads pass through untouched; the only thing the router writes is the
//! sender id, taken from the connection the message arrived on.

use serde_json::Value;
use tracing::debug;

use crate::room::RoomRegistry;
use crate::session::SessionId;
use crate::signal::{Outgoing, ServerMessage};

/// Negotiation payload addressed to one target.
#[derive(Debug, Clone, PartialEq)]
pub enum Relay {
    Offer(Value),
    Answer(Value),
    Candidate(Value),
}

impl Relay {
    fn stamp(self, sender: SessionId) -> ServerMessage {
        match self {
            Relay::Offer(offer) => ServerMessage::Offer { offer, sender },
            Relay::Answer(answer) => ServerMessage::Answer { answer, sender },
            Relay::Candidate(candidate) => ServerMessage::IceCandidate { candidate, sender },
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Relay::Offer(_) => "offer",
            Relay::Answer(_) => "answer",
            Relay::Candidate(_) => "ice-candidate",
        }
    }
}

/// Why a message was not delivered. Never reported to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    SenderNotJoined,
    TargetUnreachable,
    TargetInOtherRoom,
    RoomMismatch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Routing {
    Deliver(Outgoing),
    Dropped(DropReason),
}

pub fn route(registry: &RoomRegistry, sender: &SessionId, target: &SessionId, relay: Relay) -> Routing {
    let kind = relay.kind();
    let routing = match check_route(registry, sender, target) {
        Ok(()) => Routing::Deliver(Outgoing::new(target.clone(), relay.stamp(sender.clone()))),
        Err(reason) => Routing::Dropped(reason),
    };
    if let Routing::Dropped(reason) = &routing {
        debug!(
            "dropped {} from {} to {}: {:?}",
            kind,
            sender.short(),
            target.short(),
            reason
        );
    }
    routing
}

fn check_route(registry: &RoomRegistry, sender: &SessionId, target: &SessionId) -> Result<(), DropReason> {
    let sender_room = registry
        .session(sender)
        .and_then(|s| s.room_id.as_ref())
        .ok_or(DropReason::SenderNotJoined)?;
    let target_session = registry.session(target).ok_or(DropReason::TargetUnreachable)?;
    if target_session.room_id.as_ref() != Some(sender_room) {
        return Err(DropReason::TargetInOtherRoom);
    }
    Ok(())
}

pub fn route_offer(registry: &RoomRegistry, sender: &SessionId, target: &SessionId, offer: Value) -> Routing {
    route(registry, sender, target, Relay::Offer(offer))
}

pub fn route_answer(registry: &RoomRegistry, sender: &SessionId, target: &SessionId, answer: Value) -> Routing {
    route(registry, sender, target, Relay::Answer(answer))
}

pub fn route_candidate(
    registry: &RoomRegistry,
    sender: &SessionId,
    target: &SessionId,
    candidate: Value,
) -> Routing {
    route(registry, sender, target, Relay::Candidate(candidate))
}

/// Records the sender's camera state and fans it out to the rest of its room.
///
/// `room_id` must name the sender's own room.
pub fn broadcast_camera_toggle(
    registry: &mut RoomRegistry,
    sender: &SessionId,
    room_id: &str,
    is_camera_off: bool,
) -> Result<Vec<Outgoing>, DropReason> {
    let session = registry.session_mut(sender).ok_or(DropReason::SenderNotJoined)?;
    let room = session.room_id.clone().ok_or(DropReason::SenderNotJoined)?;
    if room.as_str() != room_id.trim() {
        debug!("camera-toggle from {} names room {}, not {}", sender.short(), room_id, room);
        return Err(DropReason::RoomMismatch);
    }
    session.camera_off = is_camera_off;
    let name = session.display_name.clone();

    let out = registry
        .members(&room)
        .into_iter()
        .filter(|member| member != sender)
        .map(|member| {
            Outgoing::new(
                member,
                ServerMessage::CameraToggled {
                    user_id: sender.clone(),
                    is_camera_off,
                    name: name.clone(),
                },
            )
        })
        .collect();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::JoinRoom;
    use serde_json::json;

    fn sid(s: &str) -> SessionId {
        SessionId::from(s)
    }

    fn room_of(members: &[(&str, &str)]) -> RoomRegistry {
        let mut registry = RoomRegistry::new();
        for (id, room) in members {
            registry.connect(sid(id));
            registry
                .join(&sid(id), &JoinRoom::new(*room, Some(format!("user-{id}"))))
                .unwrap();
        }
        registry
    }

    #[test]
    fn offer_is_stamped_with_sender() {
        let registry = room_of(&[("A", "r1"), ("B", "r1")]);
        let routing = route_offer(&registry, &sid("A"), &sid("B"), json!({"sdp": "O"}));
        assert_eq!(
            routing,
            Routing::Deliver(Outgoing::new(
                sid("B"),
                ServerMessage::Offer {
                    offer: json!({"sdp": "O"}),
                    sender: sid("A")
                }
            ))
        );
    }

    #[test]
    fn answer_and_candidate_are_relayed() {
        let registry = room_of(&[("A", "r1"), ("B", "r1")]);
        let Routing::Deliver(out) = route_answer(&registry, &sid("B"), &sid("A"), json!("R")) else {
            panic!("answer dropped");
        };
        assert_eq!(out.target, sid("A"));
        assert_eq!(out.message, ServerMessage::Answer { answer: json!("R"), sender: sid("B") });

        let Routing::Deliver(out) = route_candidate(&registry, &sid("A"), &sid("B"), json!({"candidate": "c"}))
        else {
            panic!("candidate dropped");
        };
        assert_eq!(out.message.kind(), "ice-candidate");
    }

    #[test]
    fn unknown_target_is_a_silent_noop() {
        let registry = room_of(&[("A", "r1")]);
        assert_eq!(
            route_offer(&registry, &sid("A"), &sid("ghost"), json!({})),
            Routing::Dropped(DropReason::TargetUnreachable)
        );
    }

    #[test]
    fn routing_is_scoped_to_the_senders_room() {
        let mut registry = room_of(&[("A", "r1"), ("B", "r2")]);
        assert_eq!(
            route_offer(&registry, &sid("A"), &sid("B"), json!({})),
            Routing::Dropped(DropReason::TargetInOtherRoom)
        );

        registry.connect(sid("L"));
        assert_eq!(
            route_offer(&registry, &sid("L"), &sid("A"), json!({})),
            Routing::Dropped(DropReason::SenderNotJoined)
        );
    }

    #[test]
    fn camera_toggle_excludes_sender() {
        let mut registry = room_of(&[("A", "r1"), ("B", "r1"), ("C", "r1"), ("D", "r2")]);
        let out = broadcast_camera_toggle(&mut registry, &sid("A"), "r1", true).unwrap();
        let mut targets: Vec<&str> = out.iter().map(|o| o.target.as_str()).collect();
        targets.sort();
        assert_eq!(targets, vec!["B", "C"]);
        for o in &out {
            assert_eq!(
                o.message,
                ServerMessage::CameraToggled {
                    user_id: sid("A"),
                    is_camera_off: true,
                    name: "user-A".into()
                }
            );
        }
        assert!(registry.session(&sid("A")).unwrap().camera_off);
    }

    #[test]
    fn camera_toggle_for_foreign_room_is_dropped() {
        let mut registry = room_of(&[("A", "r1"), ("D", "r2")]);
        assert_eq!(
            broadcast_camera_toggle(&mut registry, &sid("A"), "r2", true),
            Err(DropReason::RoomMismatch)
        );
        assert!(!registry.session(&sid("A")).unwrap().camera_off);
    }
}
