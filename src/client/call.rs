//! One participant's presence in one room: media, signaling and links.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::client::manager::PeerLinkManager;
use crate::client::media::MediaSource;
use crate::client::negotiation::PeerConnector;
use crate::client::presence::PresenceObserver;
use crate::client::signaling::SignalingClient;
use crate::config::CallConfig;
use crate::error::{Error, Result};
use crate::signal::ServerMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    SetCameraOff(bool),
    SetMuted(bool),
    Leave,
}

/// Controls a running [`Call`] from elsewhere, e.g. UI buttons.
#[derive(Debug, Clone)]
pub struct CallHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl CallHandle {
    pub fn set_camera_off(&self, off: bool) -> Result<()> {
        self.send(Command::SetCameraOff(off))
    }

    pub fn set_muted(&self, muted: bool) -> Result<()> {
        self.send(Command::SetMuted(muted))
    }

    /// Ends [`Call::run_until`] as if its shutdown future had resolved.
    pub fn leave(&self) -> Result<()> {
        self.send(Command::Leave)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::Signaling("call has ended".to_string()))
    }
}

pub struct Call {
    manager: PeerLinkManager,
    signaling: SignalingClient,
    events: mpsc::UnboundedReceiver<ServerMessage>,
    handle: CallHandle,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Call {
    /// Captures media, connects, and joins the room.
    ///
    /// Media is acquired first: a denied capture aborts before anything is
    /// sent to the server.
    pub async fn start(
        config: CallConfig,
        media_source: &dyn MediaSource,
        connector: Arc<dyn PeerConnector>,
        observer: Arc<dyn PresenceObserver>,
    ) -> Result<Self> {
        let media = media_source.capture().await?;

        let (signaling, events) = match SignalingClient::connect(&config.signaling_url).await {
            Ok(connected) => connected,
            Err(e) => {
                media.release();
                return Err(e);
            }
        };

        let mut manager = PeerLinkManager::new(connector, signaling.sender(), Some(media))
            .with_observer(observer)
            .with_negotiation_timeout(config.negotiation_timeout);
        if let Err(e) = manager.join(config.join).await {
            manager.leave().await;
            signaling.close().await;
            return Err(e);
        }

        let (commands_tx, commands) = mpsc::unbounded_channel();
        Ok(Self {
            manager,
            signaling,
            events,
            handle: CallHandle { commands: commands_tx },
            commands,
        })
    }

    pub fn handle(&self) -> CallHandle {
        self.handle.clone()
    }

    pub fn manager(&self) -> &PeerLinkManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut PeerLinkManager {
        &mut self.manager
    }

    /// Dispatches server messages and [`CallHandle`] commands until
    /// `shutdown` resolves, a handle asks to leave, or the server goes away.
    /// Then leaves.
    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                Some(command) = self.commands.recv() => {
                    if command == Command::Leave {
                        info!("leave requested");
                        break;
                    }
                    self.apply(command);
                }
                event = self.events.recv() => match event {
                    Some(message) => self.manager.handle(message),
                    None => {
                        warn!("signaling connection lost");
                        break;
                    }
                },
            }
        }
        self.leave().await;
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::SetCameraOff(off) => {
                if let Err(e) = self.manager.set_camera_off(off) {
                    warn!("camera toggle failed: {}", e);
                }
            }
            Command::SetMuted(muted) => self.manager.set_muted(muted),
            Command::Leave => {}
        }
    }

    /// Closes every link, releases media and disconnects.
    pub async fn leave(mut self) {
        self.manager.leave().await;
        self.signaling.close().await;
    }
}
