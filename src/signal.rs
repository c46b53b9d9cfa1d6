//! Wire messages exchanged over the signaling socket.
//!
//! Every frame is a JSON object tagged by `"type"`. Offer, answer and
//! candidate payloads stay opaque [`Value`]s on the server; only the client
//! decodes them into [`SessionDescription`] / [`IceCandidate`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::session::{resolve_display_name, RoomId, SessionId};

/// Payload of `join-room`. The one shape a join request can take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    pub room_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl JoinRoom {
    pub fn new(room_id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            room_id: room_id.into(),
            name,
        }
    }

    /// Validates the room id and applies the display name placeholder.
    pub fn resolve(&self) -> Result<(RoomId, String)> {
        let room = RoomId::parse(&self.room_id)?;
        Ok((room, resolve_display_name(self.name.as_deref())))
    }
}

/// Client → server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinRoom(JoinRoom),
    Offer {
        offer: Value,
        target: SessionId,
    },
    Answer {
        answer: Value,
        target: SessionId,
    },
    IceCandidate {
        candidate: Value,
        target: SessionId,
    },
    #[serde(rename_all = "camelCase")]
    CameraToggle {
        room_id: String,
        is_camera_off: bool,
    },
}

/// Server → client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Identity assigned to this connection, sent once on connect.
    Welcome {
        id: SessionId,
    },
    /// Confirms a `join-room` to the joiner, ahead of anything the new room
    /// sends it.
    #[serde(rename_all = "camelCase")]
    Joined {
        room_id: RoomId,
    },
    UserConnected {
        id: SessionId,
        name: String,
    },
    UserDisconnected {
        id: SessionId,
        name: String,
    },
    Offer {
        offer: Value,
        sender: SessionId,
    },
    Answer {
        answer: Value,
        sender: SessionId,
    },
    IceCandidate {
        candidate: Value,
        sender: SessionId,
    },
    #[serde(rename_all = "camelCase")]
    CameraToggled {
        user_id: SessionId,
        is_camera_off: bool,
        name: String,
    },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::Joined { .. } => "joined",
            ServerMessage::UserConnected { .. } => "user-connected",
            ServerMessage::UserDisconnected { .. } => "user-disconnected",
            ServerMessage::Offer { .. } => "offer",
            ServerMessage::Answer { .. } => "answer",
            ServerMessage::IceCandidate { .. } => "ice-candidate",
            ServerMessage::CameraToggled { .. } => "camera-toggled",
        }
    }
}

/// A server message addressed to one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub target: SessionId,
    pub message: ServerMessage,
}

impl Outgoing {
    pub fn new(target: SessionId, message: ServerMessage) -> Self {
        Self { target, message }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// Browser-shaped session description (`RTCSessionDescriptionInit`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Browser-shaped address candidate (`RTCIceCandidateInit`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}
