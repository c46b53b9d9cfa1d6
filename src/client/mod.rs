//! Client side of the mesh: one negotiated link per remote participant.

pub mod call;
pub mod link;
pub mod manager;
pub mod media;
pub mod negotiation;
pub mod presence;
pub mod signaling;

#[cfg(feature = "native")]
pub mod native;

pub use call::{Call, CallHandle};
pub use link::{LinkState, Role};
pub use manager::{LinkInfo, PeerLinkManager};
pub use media::{DetachedMedia, LocalMedia, MediaSource, MediaTrack, TrackKind};
pub use negotiation::{CandidateSink, PeerConnection, PeerConnector};
pub use presence::{LogObserver, NoopObserver, PresenceObserver};
pub use signaling::SignalingClient;
