//! Room membership and presence broadcast.
//!
//! The registry is plain state: every mutation returns the [`Outgoing`]
//! messages it implies and the caller delivers them. It is owned by
//! [`crate::app_state::AppState`] behind a single lock.

use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::session::{RoomId, Session, SessionId};
use crate::signal::{JoinRoom, Outgoing, ServerMessage};

/// Members of one room, unique by session id.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub members: BTreeSet<SessionId>,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Room {
            id,
            members: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    sessions: HashMap<SessionId, Session>,
    rooms: HashMap<RoomId, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly accepted connection.
    pub fn connect(&mut self, id: SessionId) {
        self.sessions.entry(id.clone()).or_insert_with(|| Session::new(id));
    }

    /// Leaves the current room (if any) and forgets the session.
    pub fn disconnect(&mut self, id: &SessionId) -> Vec<Outgoing> {
        let out = self.leave(id);
        self.sessions.remove(id);
        out
    }

    pub fn join(&mut self, id: &SessionId, request: &JoinRoom) -> Result<Vec<Outgoing>> {
        let (room_id, name) = request.resolve()?;
        if !self.sessions.contains_key(id) {
            return Err(Error::UnknownSession(id.clone()));
        }

        // Rejoining, even the same room, goes through a full leave first.
        let mut out = self.leave(id);

        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| Error::UnknownSession(id.clone()))?;
        session.display_name = name.clone();
        session.room_id = Some(room_id.clone());

        let room = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| Room::new(room_id.clone()));
        out.extend(room.members.iter().map(|member| {
            Outgoing::new(
                member.clone(),
                ServerMessage::UserConnected {
                    id: id.clone(),
                    name: name.clone(),
                },
            )
        }));
        room.members.insert(id.clone());

        info!(
            "{} ({}) joined room {} ({} members)",
            id.short(),
            name,
            room_id,
            room.members.len()
        );
        Ok(out)
    }

    /// Idempotent: a session outside any room produces nothing.
    pub fn leave(&mut self, id: &SessionId) -> Vec<Outgoing> {
        let Some(session) = self.sessions.get_mut(id) else {
            return Vec::new();
        };
        let Some(room_id) = session.room_id.take() else {
            return Vec::new();
        };
        let name = session.display_name.clone();

        let Some(room) = self.rooms.get_mut(&room_id) else {
            return Vec::new();
        };
        room.members.remove(id);
        let out: Vec<Outgoing> = room
            .members
            .iter()
            .map(|member| {
                Outgoing::new(
                    member.clone(),
                    ServerMessage::UserDisconnected {
                        id: id.clone(),
                        name: name.clone(),
                    },
                )
            })
            .collect();

        if room.members.is_empty() {
            self.rooms.remove(&room_id);
            debug!("room {} is empty, reclaimed", room_id);
        }
        info!("{} left room {}", id.short(), room_id);
        out
    }

    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub(crate) fn session_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Member ids of a room; empty for unknown rooms.
    pub fn members(&self, id: &RoomId) -> Vec<SessionId> {
        self.rooms
            .get(id)
            .map(|room| room.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_connected(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SessionId {
        SessionId::from(s)
    }

    fn registry_with(ids: &[&str]) -> RoomRegistry {
        let mut registry = RoomRegistry::new();
        for id in ids {
            registry.connect(sid(id));
        }
        registry
    }

    fn targets(out: &[Outgoing]) -> Vec<&str> {
        let mut t: Vec<&str> = out.iter().map(|o| o.target.as_str()).collect();
        t.sort();
        t
    }

    #[test]
    fn join_notifies_existing_members_only() {
        let mut registry = registry_with(&["A", "B", "C"]);
        let out = registry
            .join(&sid("A"), &JoinRoom::new("r1", Some("Ana".into())))
            .unwrap();
        assert!(out.is_empty());

        let out = registry
            .join(&sid("B"), &JoinRoom::new("r1", Some("Bob".into())))
            .unwrap();
        assert_eq!(
            out,
            vec![Outgoing::new(
                sid("A"),
                ServerMessage::UserConnected {
                    id: sid("B"),
                    name: "Bob".into()
                }
            )]
        );

        let out = registry.join(&sid("C"), &JoinRoom::new("r1", None)).unwrap();
        assert_eq!(targets(&out), vec!["A", "B"]);
        for o in &out {
            assert_eq!(
                o.message,
                ServerMessage::UserConnected {
                    id: sid("C"),
                    name: "Guest".into()
                }
            );
        }
    }

    #[test]
    fn blank_room_is_rejected_without_side_effects() {
        let mut registry = registry_with(&["A"]);
        let err = registry.join(&sid("A"), &JoinRoom::new("  ", None));
        assert!(matches!(err, Err(Error::MalformedJoin(_))));
        assert!(registry.session(&sid("A")).unwrap().room_id.is_none());
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn join_requires_connected_session() {
        let mut registry = RoomRegistry::new();
        let err = registry.join(&sid("ghost"), &JoinRoom::new("r1", None));
        assert!(matches!(err, Err(Error::UnknownSession(_))));
    }

    #[test]
    fn switching_rooms_leaves_the_old_one() {
        let mut registry = registry_with(&["A", "B", "C"]);
        registry.join(&sid("A"), &JoinRoom::new("r1", None)).unwrap();
        registry.join(&sid("B"), &JoinRoom::new("r1", Some("Bob".into()))).unwrap();
        registry.join(&sid("C"), &JoinRoom::new("r2", None)).unwrap();

        let out = registry.join(&sid("B"), &JoinRoom::new("r2", Some("Bob".into()))).unwrap();
        assert_eq!(
            out,
            vec![
                Outgoing::new(
                    sid("A"),
                    ServerMessage::UserDisconnected {
                        id: sid("B"),
                        name: "Bob".into()
                    }
                ),
                Outgoing::new(
                    sid("C"),
                    ServerMessage::UserConnected {
                        id: sid("B"),
                        name: "Bob".into()
                    }
                ),
            ]
        );
        let r1 = RoomId::parse("r1").unwrap();
        let r2 = RoomId::parse("r2").unwrap();
        assert_eq!(registry.members(&r1), vec![sid("A")]);
        assert_eq!(registry.members(&r2), vec![sid("B"), sid("C")]);
    }

    #[test]
    fn leave_is_idempotent() {
        let mut registry = registry_with(&["A", "B"]);
        registry.join(&sid("A"), &JoinRoom::new("r1", Some("Ana".into()))).unwrap();
        registry.join(&sid("B"), &JoinRoom::new("r1", Some("Bob".into()))).unwrap();

        let first = registry.leave(&sid("B"));
        assert_eq!(
            first,
            vec![Outgoing::new(
                sid("A"),
                ServerMessage::UserDisconnected {
                    id: sid("B"),
                    name: "Bob".into()
                }
            )]
        );
        assert!(registry.leave(&sid("B")).is_empty());
        assert!(registry.leave(&sid("nobody")).is_empty());
        assert_eq!(registry.members(&RoomId::parse("r1").unwrap()), vec![sid("A")]);
    }

    #[test]
    fn empty_rooms_are_reclaimed() {
        let mut registry = registry_with(&["A"]);
        registry.join(&sid("A"), &JoinRoom::new("r1", None)).unwrap();
        assert_eq!(registry.room_count(), 1);
        assert!(registry.disconnect(&sid("A")).is_empty());
        assert_eq!(registry.room_count(), 0);
        assert!(!registry.is_connected(&sid("A")));
    }
}
