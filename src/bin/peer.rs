//! Headless mesh participant using native peer connections.

use clap::Parser;
use meshroom::client::native::{WebRtcConnector, DEFAULT_STUN_SERVER};
use meshroom::client::{Call, CallHandle, DetachedMedia, LogObserver};
use meshroom::{telemetry, CallConfig, JoinRoom};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct PeerArgs {
    /// Signaling endpoint
    #[arg(long, default_value = "ws://127.0.0.1:3000/ws", env = "MESHROOM_URL")]
    url: String,

    /// Room to join
    #[arg(long, env = "MESHROOM_ROOM")]
    room: String,

    /// Display name shown to other participants
    #[arg(long, env = "MESHROOM_NAME")]
    name: Option<String>,

    /// STUN servers (comma-separated)
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_STUN_SERVER)]
    stun: Vec<String>,

    /// Give up on links that have not connected after this many seconds
    #[arg(long)]
    negotiation_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = PeerArgs::parse();
    telemetry::init("meshroom=info");

    let mut config = CallConfig::new(args.url, JoinRoom::new(args.room, args.name));
    if let Some(secs) = args.negotiation_timeout_secs {
        config = config.with_negotiation_timeout(Duration::from_secs(secs));
    }

    let connector = Arc::new(WebRtcConnector::new(args.stun)?);
    let call = Call::start(config, &DetachedMedia, connector, Arc::new(LogObserver)).await?;
    tokio::spawn(read_commands(call.handle()));

    call.run_until(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;
    Ok(())
}

/// `camera on|off`, `mute`, `unmute` and `leave`, one per line on stdin.
async fn read_commands(handle: CallHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let result = match line.trim() {
            "camera off" => handle.set_camera_off(true),
            "camera on" => handle.set_camera_off(false),
            "mute" => handle.set_muted(true),
            "unmute" => handle.set_muted(false),
            "leave" => handle.leave(),
            "" => continue,
            other => {
                warn!("unknown command {:?}", other);
                continue;
            }
        };
        if result.is_err() {
            break;
        }
    }
}
