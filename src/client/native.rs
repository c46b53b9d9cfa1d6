//! Negotiation seam backed by the `webrtc` crate.
//!
//! Tracks are negotiated but stay silent; feeding frames is left to whoever
//! embeds the connection.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use crate::client::media::{MediaTrack, TrackKind};
use crate::client::negotiation::{CandidateSink, PeerConnection, PeerConnector};
use crate::error::{Error, Result};
use crate::session::SessionId;
use crate::signal::{IceCandidate, SdpKind, SessionDescription};

pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

const STREAM_ID: &str = "meshroom";

fn pc_error(e: webrtc::Error) -> Error {
    Error::PeerConnection(e.to_string())
}

pub struct WebRtcConnector {
    api: API,
    config: RTCConfiguration,
}

impl WebRtcConnector {
    pub fn new(stun_servers: Vec<String>) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs().map_err(pc_error)?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine).map_err(pc_error)?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let urls = if stun_servers.is_empty() {
            vec![DEFAULT_STUN_SERVER.to_string()]
        } else {
            stun_servers
        };
        let config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls,
                ..Default::default()
            }],
            ..Default::default()
        };
        Ok(Self { api, config })
    }
}

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn open(&self, remote: &SessionId, candidates: CandidateSink) -> Result<Box<dyn PeerConnection>> {
        let pc = Arc::new(
            self.api
                .new_peer_connection(self.config.clone())
                .await
                .map_err(pc_error)?,
        );

        let remote_label = remote.short().to_string();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            // None marks the end of gathering.
            if let Some(candidate) = candidate {
                match candidate.to_json() {
                    Ok(init) => {
                        let sent = candidates.send(&IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_m_line_index: init.sdp_mline_index,
                            username_fragment: init.username_fragment,
                        });
                        if !sent {
                            debug!("signaling gone, local candidate for {} discarded", remote_label);
                        }
                    }
                    Err(e) => debug!("unable to serialize local candidate: {}", e),
                }
            }
            Box::pin(async {})
        }));

        Ok(Box::new(WebRtcConnection { pc }))
    }
}

pub struct WebRtcConnection {
    pc: Arc<RTCPeerConnection>,
}

fn to_rtc(description: SessionDescription) -> Result<RTCSessionDescription> {
    let converted = match description.kind {
        SdpKind::Offer => RTCSessionDescription::offer(description.sdp),
        SdpKind::Answer => RTCSessionDescription::answer(description.sdp),
        SdpKind::Pranswer => RTCSessionDescription::pranswer(description.sdp),
        SdpKind::Rollback => {
            return Err(Error::PeerConnection("rollback descriptions are not supported".to_string()))
        }
    };
    converted.map_err(pc_error)
}

fn from_rtc(description: RTCSessionDescription) -> Result<SessionDescription> {
    let kind = match description.sdp_type {
        RTCSdpType::Offer => SdpKind::Offer,
        RTCSdpType::Answer => SdpKind::Answer,
        RTCSdpType::Pranswer => SdpKind::Pranswer,
        RTCSdpType::Rollback => SdpKind::Rollback,
        other => return Err(Error::PeerConnection(format!("unexpected description type {other}"))),
    };
    Ok(SessionDescription {
        kind,
        sdp: description.sdp,
    })
}

#[async_trait]
impl PeerConnection for WebRtcConnection {
    /// Negotiates one sendonly-capable track per local track. No samples are
    /// ever written to them: this backend carries signaling and transport
    /// only, so a track's enabled flag has nothing to gate here.
    async fn attach_media(&self, tracks: &[Arc<MediaTrack>]) -> Result<()> {
        for track in tracks {
            let mime_type = match track.kind() {
                TrackKind::Audio => MIME_TYPE_OPUS,
                TrackKind::Video => MIME_TYPE_VP8,
            };
            let local = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: mime_type.to_owned(),
                    ..Default::default()
                },
                track.id().to_owned(),
                STREAM_ID.to_owned(),
            ));
            self.pc
                .add_track(local as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .map_err(pc_error)?;
        }
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        from_rtc(self.pc.create_offer(None).await.map_err(pc_error)?)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        from_rtc(self.pc.create_answer(None).await.map_err(pc_error)?)
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.pc
            .set_local_description(to_rtc(description)?)
            .await
            .map_err(pc_error)
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.pc
            .set_remote_description(to_rtc(description)?)
            .await
            .map_err(pc_error)
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_m_line_index,
                username_fragment: candidate.username_fragment,
            })
            .await
            .map_err(pc_error)
    }

    async fn close(&self) {
        if let Err(e) = self.pc.close().await {
            debug!("error while closing peer connection: {}", e);
        }
    }
}
