//! WebSocket connection to the signaling server.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::signal::{ClientMessage, ServerMessage};

pub struct SignalingClient {
    tx: mpsc::UnboundedSender<ClientMessage>,
    shutdown: Option<oneshot::Sender<()>>,
    sender_task: JoinHandle<()>,
    receiver_task: JoinHandle<()>,
}

impl SignalingClient {
    /// Connects and starts the reader/writer tasks. Decoded server messages
    /// arrive on the returned receiver in socket order.
    pub async fn connect(url: &str) -> Result<(Self, mpsc::UnboundedReceiver<ServerMessage>)> {
        info!("connecting to signaling server {}", url);
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::Signaling(format!("failed to connect to {url}: {e}")))?;
        let (mut write, mut read) = ws_stream.split();

        let (tx, mut rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (events_tx, events_rx) = mpsc::unbounded_channel::<ServerMessage>();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let sender_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    msg = rx.recv() => {
                        let Some(msg) = msg else { break };
                        let text = match serde_json::to_string(&msg) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!("failed to encode outgoing message: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = write.send(Message::Text(text)).await {
                            error!("failed to send signaling message: {}", e);
                            break;
                        }
                    }
                    _ = &mut shutdown_rx => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            debug!("signaling sender task terminated");
        });

        let receiver_task = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(msg) => {
                            if events_tx.send(msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("ignoring undecodable server message: {}", e),
                    },
                    Ok(Message::Close(_)) => {
                        info!("signaling connection closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("signaling socket error: {}", e);
                        break;
                    }
                }
            }
            debug!("signaling receiver task terminated");
        });

        let client = Self {
            tx,
            shutdown: Some(shutdown_tx),
            sender_task,
            receiver_task,
        };
        Ok((client, events_rx))
    }

    /// Queue handle for outgoing messages; cloned into the link manager.
    pub fn sender(&self) -> mpsc::UnboundedSender<ClientMessage> {
        self.tx.clone()
    }

    /// Flushes queued messages, sends a close frame and stops both tasks.
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.sender_task).await {
            warn!("signaling sender task failed: {}", e);
        }
        self.receiver_task.abort();
    }
}
