//! Error types shared by the signaling server and the peer client.

use crate::session::SessionId;

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by registry, router and client operations.
///
/// Unreachable routing targets are deliberately absent: those messages are
/// dropped without an error (see [`crate::router::DropReason`]).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Local capture permission refused; the session never joins.
    #[error("Media access denied: {0}")]
    MediaAccessDenied(String),

    /// `join-room` without a usable room id.
    #[error("Malformed join payload: {0}")]
    MalformedJoin(String),

    /// Operation on a session id the registry does not know.
    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    /// Description or candidate rejected while negotiating with one remote.
    #[error("Negotiation with {remote} failed: {reason}")]
    Negotiation { remote: SessionId, reason: String },

    /// Failure reported by the underlying peer connection primitive.
    #[error("Peer connection error: {0}")]
    PeerConnection(String),

    /// Joining again after `leave` released the local capture.
    #[error("Local media was released; supply a new capture before joining")]
    MediaReleased,

    /// Client operation that needs a joined room.
    #[error("Not joined to any room")]
    NotJoined,

    /// Signaling transport failure.
    #[error("Signaling error: {0}")]
    Signaling(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
