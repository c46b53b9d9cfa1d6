//! Command line and environment configuration.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::signal::JoinRoom;

/// Signaling server for full-mesh rooms.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket listener binds to
    #[arg(long, default_value = "127.0.0.1:3000", env = "MESHROOM_BIND")]
    pub bind: SocketAddr,

    /// Directory served for non-signaling requests
    #[arg(long, default_value = "public", env = "MESHROOM_STATIC_DIR")]
    pub static_dir: PathBuf,

    /// Do not serve static files at all
    #[arg(long, default_value_t = false)]
    pub no_static: bool,
}

impl ServerConfig {
    pub fn static_dir(&self) -> Option<&std::path::Path> {
        (!self.no_static).then_some(self.static_dir.as_path())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            static_dir: PathBuf::from("public"),
            no_static: false,
        }
    }
}

/// Everything a client needs to take part in one room.
#[derive(Debug, Clone)]
pub struct CallConfig {
    /// `ws://` or `wss://` URL of the signaling endpoint
    pub signaling_url: String,
    pub join: JoinRoom,
    /// Fail links still negotiating after this long. `None` waits forever.
    pub negotiation_timeout: Option<Duration>,
}

impl CallConfig {
    pub fn new(signaling_url: impl Into<String>, join: JoinRoom) -> Self {
        Self {
            signaling_url: signaling_url.into(),
            join,
            negotiation_timeout: None,
        }
    }

    pub fn with_negotiation_timeout(mut self, timeout: Duration) -> Self {
        self.negotiation_timeout = Some(timeout);
        self
    }
}
