use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::coordinator::SessionCoordinator;
use super::settings::{ModelProfile, SessionSettings};
use super::state::SessionState;
use crate::audio::{AudioGateway, SAMPLE_RATE};
use crate::events::EventStream;
use crate::language::LanguageDirection;
use crate::repository::Repository;
use crate::signaling::{
    IceServer, SessionMetricsRequest, SignalingApi, StartSessionRequest, StopSessionRequest,
    UpdateSessionRequest,
};
use crate::translation::TranslationContent;
use crate::transport::PeerTransport;

const TRANSCRIPT_CAPACITY: usize = 16;
const GENERIC_START_FAILURE: &str = "Translation session failed to start";

/// Coordinator-private realtime session fields. Guarded by the session lock.
#[derive(Default)]
struct SessionInner {
    session_id: Option<String>,
    token: Option<String>,
    capture_task: Option<JoinHandle<()>>,
    playback_task: Option<JoinHandle<()>>,
    events_task: Option<JoinHandle<()>>,
}

/// Shared guts of the coordinator; background tasks hold an `Arc` of this.
struct Core {
    signaling: Arc<dyn SignalingApi>,
    transport: Arc<dyn PeerTransport>,
    audio: Arc<dyn AudioGateway>,
    repository: Arc<dyn Repository>,
    state_tx: watch::Sender<SessionState>,
    transcript_tx: broadcast::Sender<TranslationContent>,
    inner: Mutex<SessionInner>,
    last_audio_sent: Mutex<Option<Instant>>,
}

impl Core {
    /// Handle one finalized caption from the event stream.
    ///
    /// The latency figure is elapsed time since the most recent successfully
    /// sent audio frame; events carry no correlation id, so this is an
    /// accepted approximation rather than a per-event round trip.
    async fn on_translation_received(&self, content: TranslationContent) {
        // At-most-once emission; lagging subscribers skip old segments.
        let _ = self.transcript_tx.send(content.clone());

        let latency_ms = self
            .last_audio_sent
            .lock()
            .await
            .map(|sent| sent.elapsed().as_millis() as u64);

        self.state_tx.send_modify(|state| {
            state.current_segment = Some(content.clone());
            if let Some(ms) = latency_ms {
                state.latency.translation_ms = Some(ms);
            }
        });

        if let Some(ms) = latency_ms {
            let session_id = self.inner.lock().await.session_id.clone();
            if let Some(session_id) = session_id {
                let request = SessionMetricsRequest {
                    session_id,
                    latency: ms,
                    error_code: None,
                };
                if let Err(e) = self.signaling.send_metrics(request).await {
                    warn!("Metrics report failed: {:#}", e);
                }
            }
        }

        if let Err(e) = self.repository.append_history(content).await {
            warn!("History append failed: {:#}", e);
        }
    }

    /// Stream termination is a lost session: tear everything down to Idle
    /// with an error message.
    async fn fail_from_stream(&self, message: String) {
        let mut inner = self.inner.lock().await;
        if !self.state_tx.borrow().is_active {
            return;
        }

        error!("Event stream terminated, ending session: {}", message);

        cancel_task(&mut inner.capture_task).await;
        cancel_task(&mut inner.playback_task).await;
        // This runs on the events task itself; it ends right after this call.
        inner.events_task = None;

        self.release_devices_and_transport().await;
        if let Some(session_id) = inner.session_id.take() {
            self.notify_stop(session_id).await;
        }
        inner.token = None;
        *self.last_audio_sent.lock().await = None;

        self.state_tx.send_replace(SessionState::failed(message));
    }

    /// Rollback tail shared by every teardown path: capture stop, playback
    /// release, transport close, in that order.
    async fn release_devices_and_transport(&self) {
        if let Err(e) = self.audio.stop_capture().await {
            warn!("Capture stop failed: {:#}", e);
        }
        if let Err(e) = self.audio.release_playback().await {
            warn!("Playback release failed: {:#}", e);
        }
        if let Err(e) = self.transport.close().await {
            warn!("Transport close failed: {:#}", e);
        }
    }

    /// Best-effort stop notification; failure never blocks teardown.
    async fn notify_stop(&self, session_id: String) {
        let request = StopSessionRequest { session_id };
        if let Err(e) = self.signaling.stop_session(request).await {
            warn!("Session stop notification failed: {:#}", e);
        }
    }
}

/// Forward captured PCM buffers into the transport, stamping the send instant
/// only for frames the transport actually wrote.
fn spawn_capture_task(
    core: &Arc<Core>,
    mut capture_rx: tokio::sync::mpsc::Receiver<Vec<u8>>,
) -> JoinHandle<()> {
    let core = Arc::clone(core);
    tokio::spawn(async move {
        while let Some(buffer) = capture_rx.recv().await {
            match core.transport.send_audio_frame(&buffer).await {
                Ok(true) => {
                    *core.last_audio_sent.lock().await = Some(Instant::now());
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Audio forward failed: {:#}", e);
                }
            }
        }
        info!("Capture forwarding task stopped");
    })
}

/// Drive decoded remote audio into playback.
fn spawn_playback_task(core: &Arc<Core>) -> JoinHandle<()> {
    let core = Arc::clone(core);
    let mut remote = core.transport.remote_audio();
    tokio::spawn(async move {
        loop {
            match remote.recv().await {
                Ok(pcm) => {
                    if let Err(e) = core.audio.play_audio(&pcm, SAMPLE_RATE).await {
                        warn!("Playback failed: {:#}", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Playback lagging, dropped {} buffers", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        info!("Playback task stopped");
    })
}

/// Cancel a background task and wait for it to actually finish before
/// touching the devices it may be using.
async fn cancel_task(slot: &mut Option<JoinHandle<()>>) {
    if let Some(task) = slot.take() {
        task.abort();
        if let Err(e) = task.await {
            if !e.is_cancelled() {
                error!("Background task panicked: {}", e);
            }
        }
    }
}

/// Realtime session coordinator: single source of truth for whether a
/// translation session is running, and the sole mutator of `SessionState`.
///
/// Every public operation serializes on one session lock for its full
/// duration, so interleaved starts and stops cannot leave the capture device
/// or the transport in an inconsistent state.
pub struct RealtimeCoordinator {
    core: Arc<Core>,
    events: EventStream,
}

impl RealtimeCoordinator {
    pub fn new(
        signaling: Arc<dyn SignalingApi>,
        transport: Arc<dyn PeerTransport>,
        audio: Arc<dyn AudioGateway>,
        repository: Arc<dyn Repository>,
        events: EventStream,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::default());
        let (transcript_tx, _) = broadcast::channel(TRANSCRIPT_CAPACITY);
        Self {
            core: Arc::new(Core {
                signaling,
                transport,
                audio,
                repository,
                state_tx,
                transcript_tx,
                inner: Mutex::new(SessionInner::default()),
                last_audio_sent: Mutex::new(None),
            }),
            events,
        }
    }

    /// The fallible middle of `start()`; the caller owns the rollback.
    async fn try_start(&self, inner: &mut SessionInner, settings: &SessionSettings) -> Result<()> {
        let core = &self.core;

        let request =
            StartSessionRequest::new(&settings.direction, &settings.model, settings.offline_fallback);
        let response = core.signaling.start_session(request).await?;

        let ice_servers = if response.ice_servers.is_empty() {
            vec![IceServer::default_stun()]
        } else {
            response.ice_servers.clone()
        };

        core.transport.create_peer_connection(&ice_servers).await?;
        core.transport
            .set_remote_description(&response.webrtc_sdp)
            .await?;
        let answer = core.transport.create_answer().await?;
        core.signaling
            .update_session(UpdateSessionRequest {
                session_id: response.session_id.clone(),
                webrtc_answer: Some(answer),
                ..Default::default()
            })
            .await
            .context("Failed to post negotiated answer")?;

        let mut subscription = self
            .events
            .listen(&response.session_id, &response.token)
            .context("Failed to open caption event stream")?;

        let capture_rx = core
            .audio
            .start_capture()
            .await
            .context("Failed to start audio capture")?;

        inner.session_id = Some(response.session_id);
        inner.token = Some(response.token);
        inner.capture_task = Some(spawn_capture_task(core, capture_rx));
        inner.playback_task = Some(spawn_playback_task(core));

        let events_core = Arc::clone(core);
        inner.events_task = Some(tokio::spawn(async move {
            while let Some(item) = subscription.next().await {
                match item {
                    Ok(content) => events_core.on_translation_received(content).await,
                    Err(cause) => {
                        events_core.fail_from_stream(cause.to_string()).await;
                        return;
                    }
                }
            }
        }));

        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionCoordinator for RealtimeCoordinator {
    async fn start(&self, settings: SessionSettings) {
        let core = Arc::clone(&self.core);
        let mut inner = core.inner.lock().await;

        if core.state_tx.borrow().is_active {
            info!("Session already active, ignoring start");
            return;
        }

        info!(
            "Starting realtime session: direction={} model={}",
            settings.direction.id(),
            settings.model.name()
        );

        // Optimistic activation: a concurrent start sees is_active and no-ops.
        core.state_tx.send_replace(SessionState {
            is_active: true,
            direction: settings.direction.clone(),
            ..SessionState::default()
        });

        match self.try_start(&mut inner, &settings).await {
            Ok(()) => {
                core.state_tx.send_modify(|state| {
                    state.is_microphone_open = true;
                });
                info!("Realtime session started");
            }
            Err(e) => {
                error!("Session start failed: {:#}", e);

                // Unconditional ordered rollback: capture stop, playback
                // release, transport close, identifier clear, state reset.
                cancel_task(&mut inner.capture_task).await;
                cancel_task(&mut inner.playback_task).await;
                cancel_task(&mut inner.events_task).await;
                core.release_devices_and_transport().await;
                inner.session_id = None;
                inner.token = None;
                *core.last_audio_sent.lock().await = None;

                let message = {
                    let text = format!("{:#}", e);
                    if text.trim().is_empty() {
                        GENERIC_START_FAILURE.to_string()
                    } else {
                        text
                    }
                };
                core.state_tx.send_replace(SessionState::failed(message));
            }
        }
    }

    async fn stop(&self) {
        let core = &self.core;
        let mut inner = core.inner.lock().await;

        if !core.state_tx.borrow().is_active {
            return;
        }

        info!("Stopping realtime session");

        cancel_task(&mut inner.events_task).await;
        cancel_task(&mut inner.capture_task).await;
        cancel_task(&mut inner.playback_task).await;
        core.release_devices_and_transport().await;

        if let Some(session_id) = inner.session_id.take() {
            core.notify_stop(session_id).await;
        }
        inner.token = None;
        *core.last_audio_sent.lock().await = None;

        core.state_tx.send_replace(SessionState::default());
        info!("Realtime session stopped");
    }

    async fn toggle_microphone(&self) -> bool {
        let core = Arc::clone(&self.core);
        let mut inner = core.inner.lock().await;

        if core.state_tx.borrow().is_microphone_open {
            cancel_task(&mut inner.capture_task).await;
            if let Err(e) = core.audio.stop_capture().await {
                warn!("Capture stop failed: {:#}", e);
            }
            core.state_tx.send_modify(|state| {
                state.is_microphone_open = false;
            });
            info!("Microphone closed");
            return true;
        }

        // Opening requires a live session.
        if inner.session_id.is_none() {
            return false;
        }

        let capture_rx = match core.audio.start_capture().await {
            Ok(rx) => rx,
            Err(e) => {
                warn!("Microphone reopen failed: {:#}", e);
                return false;
            }
        };
        inner.capture_task = Some(spawn_capture_task(&core, capture_rx));
        core.state_tx.send_modify(|state| {
            state.is_microphone_open = true;
        });
        info!("Microphone opened");
        true
    }

    async fn update_direction(&self, direction: LanguageDirection) {
        let core = &self.core;
        let inner = core.inner.lock().await;

        // Local state first so consumers never wait on the network.
        core.state_tx.send_modify(|state| {
            state.direction = direction.clone();
        });

        match core.repository.load_settings().await {
            Ok(mut settings) => {
                settings.direction = direction.clone();
                if let Err(e) = core.repository.save_settings(settings).await {
                    warn!("Settings save failed: {:#}", e);
                }
            }
            Err(e) => warn!("Settings load failed: {:#}", e),
        }

        if let Some(session_id) = inner.session_id.clone() {
            let request = UpdateSessionRequest {
                session_id,
                direction: Some(direction.id()),
                ..Default::default()
            };
            if let Err(e) = core.signaling.update_session(request).await {
                warn!("Direction update not delivered: {:#}", e);
            }
        }
    }

    async fn update_model(&self, model: ModelProfile) {
        let core = &self.core;
        let inner = core.inner.lock().await;

        match core.repository.load_settings().await {
            Ok(mut settings) => {
                settings.model = model.clone();
                if let Err(e) = core.repository.save_settings(settings).await {
                    warn!("Settings save failed: {:#}", e);
                }
            }
            Err(e) => warn!("Settings load failed: {:#}", e),
        }

        if let Some(session_id) = inner.session_id.clone() {
            let request = UpdateSessionRequest {
                session_id,
                model: Some(model.name().to_string()),
                ..Default::default()
            };
            if let Err(e) = core.signaling.update_session(request).await {
                warn!("Model update not delivered: {:#}", e);
            }
        }
    }

    fn state(&self) -> watch::Receiver<SessionState> {
        self.core.state_tx.subscribe()
    }

    fn transcripts(&self) -> broadcast::Receiver<TranslationContent> {
        self.core.transcript_tx.subscribe()
    }
}
