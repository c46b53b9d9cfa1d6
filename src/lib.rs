//! Signaling for full-mesh rooms.
//!
//! The server half ([`room`], [`router`], [`server`]) keeps room membership
//! and relays negotiation messages between participants. The client half
//! ([`client`]) turns those messages into one negotiated link per remote
//! participant.

pub mod app_state;
pub mod client;
pub mod config;
pub mod error;
pub mod room;
pub mod router;
pub mod server;
pub mod session;
pub mod signal;
pub mod telemetry;

pub use app_state::AppState;
pub use config::{CallConfig, ServerConfig};
pub use error::{Error, Result};
pub use session::{RoomId, SessionId};
pub use signal::{ClientMessage, JoinRoom, ServerMessage};
