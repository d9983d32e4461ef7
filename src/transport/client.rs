use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS};
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

use super::events::{ConnectionHealth, TransportEvent};
use crate::signaling::IceServer;

const REMOTE_AUDIO_CAPACITY: usize = 16;
const EVENT_CAPACITY: usize = 32;
const FRAME_DURATION: Duration = Duration::from_millis(20);

/// Minimal negotiation surface over the peer media/data transport.
///
/// Owns at most one underlying peer connection at a time; the coordinator
/// that created it is its only user.
#[async_trait::async_trait]
pub trait PeerTransport: Send + Sync {
    /// Create the peer connection for the given ICE servers.
    ///
    /// Reuse policy: calling this twice without an intervening `close()` keeps
    /// the existing connection and is a no-op.
    async fn create_peer_connection(&self, ice_servers: &[IceServer]) -> Result<()>;

    /// Apply the server-side SDP offer.
    async fn set_remote_description(&self, offer_sdp: &str) -> Result<()>;

    /// Create the local answer and return its SDP.
    async fn create_answer(&self) -> Result<String>;

    /// Queue one audio frame for sending.
    ///
    /// Returns whether the frame was actually written; `false` is not a
    /// failure, only "this frame didn't count" (used by the latency stamp).
    async fn send_audio_frame(&self, pcm: &[u8]) -> Result<bool>;

    /// Decoded remote audio buffers. Bounded; the oldest buffer is dropped
    /// when a slow consumer falls behind.
    fn remote_audio(&self) -> broadcast::Receiver<Vec<u8>>;

    /// Connection-state changes and control data-channel messages.
    fn transport_events(&self) -> broadcast::Receiver<TransportEvent>;

    /// Release the connection and local media resources. Safe when nothing is
    /// open.
    async fn close(&self) -> Result<()>;
}

struct ActiveConnection {
    peer: Arc<RTCPeerConnection>,
    track: Arc<TrackLocalStaticSample>,
    healthy: Arc<AtomicBool>,
}

/// WebRTC-backed transport.
pub struct WebRtcTransport {
    connection: Mutex<Option<ActiveConnection>>,
    remote_audio_tx: broadcast::Sender<Vec<u8>>,
    events_tx: broadcast::Sender<TransportEvent>,
}

impl WebRtcTransport {
    pub fn new() -> Self {
        let (remote_audio_tx, _) = broadcast::channel(REMOTE_AUDIO_CAPACITY);
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            connection: Mutex::new(None),
            remote_audio_tx,
            events_tx,
        }
    }

    async fn build_peer(&self, ice_servers: &[IceServer]) -> Result<Arc<RTCPeerConnection>> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .context("Failed to register codecs")?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)
            .context("Failed to register interceptors")?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer = api
            .new_peer_connection(config)
            .await
            .context("Failed to create peer connection")?;

        Ok(Arc::new(peer))
    }

    fn watch_connection_state(&self, peer: &Arc<RTCPeerConnection>, healthy: Arc<AtomicBool>) {
        let events_tx = self.events_tx.clone();
        peer.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let health = match state {
                RTCPeerConnectionState::Connected => ConnectionHealth::Connected,
                RTCPeerConnectionState::Failed => ConnectionHealth::Failed,
                RTCPeerConnectionState::Closed => ConnectionHealth::Closed,
                _ => ConnectionHealth::Connecting,
            };
            if matches!(health, ConnectionHealth::Failed | ConnectionHealth::Closed) {
                healthy.store(false, Ordering::SeqCst);
            }
            let _ = events_tx.send(TransportEvent::ConnectionStateChanged(health));
            Box::pin(async {})
        }));
    }

    fn watch_remote_audio(&self, peer: &Arc<RTCPeerConnection>) {
        let audio_tx = self.remote_audio_tx.clone();
        peer.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
            let audio_tx = audio_tx.clone();
            Box::pin(async move {
                info!("Remote track opened: {}", track.codec().capability.mime_type);
                while let Ok((packet, _)) = track.read_rtp().await {
                    if packet.payload.is_empty() {
                        continue;
                    }
                    // broadcast drops the oldest buffer for lagging receivers
                    // instead of growing unbounded.
                    let _ = audio_tx.send(packet.payload.to_vec());
                }
                info!("Remote track closed");
            })
        }));
    }

    fn watch_data_channel(&self, peer: &Arc<RTCPeerConnection>) {
        let events_tx = self.events_tx.clone();
        peer.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
            let events_tx = events_tx.clone();
            Box::pin(async move {
                info!("Data channel opened: {}", channel.label());
                channel.on_message(Box::new(move |message: DataChannelMessage| {
                    let events_tx = events_tx.clone();
                    Box::pin(async move {
                        if let Ok(text) = std::str::from_utf8(&message.data) {
                            let _ =
                                events_tx.send(TransportEvent::DataChannelMessage(text.to_string()));
                        }
                    })
                }));
            })
        }));
    }
}

impl Default for WebRtcTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PeerTransport for WebRtcTransport {
    async fn create_peer_connection(&self, ice_servers: &[IceServer]) -> Result<()> {
        let mut connection = self.connection.lock().await;
        if connection.is_some() {
            info!("Peer connection already exists, keeping it");
            return Ok(());
        }

        let peer = self.build_peer(ice_servers).await?;
        let healthy = Arc::new(AtomicBool::new(true));

        self.watch_connection_state(&peer, Arc::clone(&healthy));
        self.watch_remote_audio(&peer);
        self.watch_data_channel(&peer);

        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_string(),
                clock_rate: 48_000,
                channels: 1,
                ..Default::default()
            },
            "audio".to_string(),
            "voicebridge-capture".to_string(),
        ));

        let rtp_sender = peer
            .add_track(Arc::clone(&track) as Arc<_>)
            .await
            .context("Failed to add local audio track")?;

        // Drain RTCP so the sender keeps flowing.
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while rtp_sender.read(&mut rtcp_buf).await.is_ok() {}
        });

        *connection = Some(ActiveConnection {
            peer,
            track,
            healthy,
        });
        info!("Peer connection created");
        Ok(())
    }

    async fn set_remote_description(&self, offer_sdp: &str) -> Result<()> {
        let connection = self.connection.lock().await;
        let active = connection
            .as_ref()
            .context("No peer connection; create one before negotiating")?;

        let offer = RTCSessionDescription::offer(offer_sdp.to_string())
            .context("Invalid remote offer SDP")?;
        active
            .peer
            .set_remote_description(offer)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }

    async fn create_answer(&self) -> Result<String> {
        let connection = self.connection.lock().await;
        let active = match connection.as_ref() {
            Some(active) => active,
            None => bail!("Cannot create answer: no peer connection"),
        };

        let answer = active
            .peer
            .create_answer(None)
            .await
            .context("Answer negotiation failed")?;
        active
            .peer
            .set_local_description(answer)
            .await
            .context("Failed to set local description")?;

        // Offer the answer immediately rather than waiting out ICE gathering;
        // trickled candidates complete the connection afterwards.
        let local = active
            .peer
            .local_description()
            .await
            .context("Local description missing after answer")?;
        Ok(local.sdp)
    }

    async fn send_audio_frame(&self, pcm: &[u8]) -> Result<bool> {
        let connection = self.connection.lock().await;
        let active = match connection.as_ref() {
            Some(active) if active.healthy.load(Ordering::SeqCst) => active,
            _ => return Ok(false),
        };

        let result = active
            .track
            .write_sample(&Sample {
                data: pcm.to_vec().into(),
                duration: FRAME_DURATION,
                ..Default::default()
            })
            .await;

        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!("Audio frame write failed: {}", e);
                Ok(false)
            }
        }
    }

    fn remote_audio(&self) -> broadcast::Receiver<Vec<u8>> {
        self.remote_audio_tx.subscribe()
    }

    fn transport_events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events_tx.subscribe()
    }

    async fn close(&self) -> Result<()> {
        let mut connection = self.connection.lock().await;
        if let Some(active) = connection.take() {
            if let Err(e) = active.peer.close().await {
                warn!("Peer connection close failed: {}", e);
            }
            info!("Peer connection closed");
        }
        Ok(())
    }
}
