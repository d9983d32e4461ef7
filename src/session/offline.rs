use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::coordinator::SessionCoordinator;
use super::settings::{ModelProfile, SessionSettings};
use super::state::SessionState;
use crate::audio::AudioGateway;
use crate::language::LanguageDirection;
use crate::repository::Repository;
use crate::translation::{InputMode, TranslationContent};

const TRANSCRIPT_CAPACITY: usize = 16;

/// One recognized chunk from the on-device engine.
#[derive(Debug, Clone)]
pub struct OfflineSegment {
    pub transcript: String,
    pub translation: String,
    pub detected_source: Option<crate::language::Language>,
}

/// Opaque on-device transcription engine.
///
/// Returns None for chunks with no recognizable speech.
#[async_trait::async_trait]
pub trait TranscriptionEngine: Send + Sync {
    async fn transcribe(
        &self,
        pcm: &[u8],
        direction: &LanguageDirection,
    ) -> Result<Option<OfflineSegment>>;
}

struct OfflineShared {
    audio: Arc<dyn AudioGateway>,
    engine: Arc<dyn TranscriptionEngine>,
    repository: Arc<dyn Repository>,
    state_tx: watch::Sender<SessionState>,
    transcript_tx: broadcast::Sender<TranslationContent>,
}

#[derive(Default)]
struct OfflineInner {
    running: bool,
    capture_task: Option<JoinHandle<()>>,
}

/// On-device fallback coordinator: the realtime contract without network,
/// transport, or signaling — the capture loop feeds the local engine instead.
pub struct OfflineCoordinator {
    shared: Arc<OfflineShared>,
    inner: Mutex<OfflineInner>,
}

impl OfflineCoordinator {
    pub fn new(
        audio: Arc<dyn AudioGateway>,
        engine: Arc<dyn TranscriptionEngine>,
        repository: Arc<dyn Repository>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::default());
        let (transcript_tx, _) = broadcast::channel(TRANSCRIPT_CAPACITY);
        Self {
            shared: Arc::new(OfflineShared {
                audio,
                engine,
                repository,
                state_tx,
                transcript_tx,
            }),
            inner: Mutex::new(OfflineInner::default()),
        }
    }
}

/// Run capture through the engine until the channel closes or the task is
/// cancelled.
fn spawn_transcription_task(
    shared: &Arc<OfflineShared>,
    mut capture_rx: tokio::sync::mpsc::Receiver<Vec<u8>>,
    direction: LanguageDirection,
) -> JoinHandle<()> {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        while let Some(buffer) = capture_rx.recv().await {
            let segment = match shared.engine.transcribe(&buffer, &direction).await {
                Ok(Some(segment)) => segment,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Offline transcription failed: {:#}", e);
                    continue;
                }
            };

            let content = TranslationContent {
                transcript: segment.transcript,
                translation: segment.translation,
                audio_path: None,
                timestamp: Utc::now(),
                detected_source: segment.detected_source,
                target_language: direction.target.clone(),
                input_mode: InputMode::Voice,
            };
            if content.is_blank() {
                continue;
            }

            let _ = shared.transcript_tx.send(content.clone());
            shared.state_tx.send_modify(|state| {
                state.current_segment = Some(content.clone());
            });
            if let Err(e) = shared.repository.append_history(content).await {
                warn!("History append failed: {:#}", e);
            }
        }
        info!("Offline transcription task stopped");
    })
}

async fn cancel_task(slot: &mut Option<JoinHandle<()>>) {
    if let Some(task) = slot.take() {
        task.abort();
        if let Err(e) = task.await {
            if !e.is_cancelled() {
                error!("Offline task panicked: {}", e);
            }
        }
    }
}

#[async_trait::async_trait]
impl SessionCoordinator for OfflineCoordinator {
    async fn start(&self, settings: SessionSettings) {
        let mut inner = self.inner.lock().await;
        if inner.running {
            info!("Offline session already active, ignoring start");
            return;
        }

        info!(
            "Starting offline session: direction={}",
            settings.direction.id()
        );

        let capture_rx = match self.shared.audio.start_capture().await {
            Ok(rx) => rx,
            Err(e) => {
                error!("Offline session start failed: {:#}", e);
                self.shared
                    .state_tx
                    .send_replace(SessionState::failed(format!("{:#}", e)));
                return;
            }
        };

        inner.running = true;
        inner.capture_task = Some(spawn_transcription_task(
            &self.shared,
            capture_rx,
            settings.direction.clone(),
        ));

        self.shared.state_tx.send_replace(SessionState {
            is_active: true,
            is_microphone_open: true,
            direction: settings.direction,
            ..SessionState::default()
        });
    }

    async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.running {
            return;
        }

        info!("Stopping offline session");
        cancel_task(&mut inner.capture_task).await;
        if let Err(e) = self.shared.audio.stop_capture().await {
            warn!("Capture stop failed: {:#}", e);
        }
        if let Err(e) = self.shared.audio.release_playback().await {
            warn!("Playback release failed: {:#}", e);
        }
        inner.running = false;
        self.shared.state_tx.send_replace(SessionState::default());
    }

    async fn toggle_microphone(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.running {
            return false;
        }

        if self.shared.state_tx.borrow().is_microphone_open {
            cancel_task(&mut inner.capture_task).await;
            if let Err(e) = self.shared.audio.stop_capture().await {
                warn!("Capture stop failed: {:#}", e);
            }
            self.shared.state_tx.send_modify(|state| {
                state.is_microphone_open = false;
            });
            return true;
        }

        let direction = self.shared.state_tx.borrow().direction.clone();
        let capture_rx = match self.shared.audio.start_capture().await {
            Ok(rx) => rx,
            Err(e) => {
                warn!("Microphone reopen failed: {:#}", e);
                return false;
            }
        };
        inner.capture_task = Some(spawn_transcription_task(&self.shared, capture_rx, direction));
        self.shared.state_tx.send_modify(|state| {
            state.is_microphone_open = true;
        });
        true
    }

    async fn update_direction(&self, direction: LanguageDirection) {
        let _inner = self.inner.lock().await;
        self.shared.state_tx.send_modify(|state| {
            state.direction = direction.clone();
        });
        match self.shared.repository.load_settings().await {
            Ok(mut settings) => {
                settings.direction = direction;
                if let Err(e) = self.shared.repository.save_settings(settings).await {
                    warn!("Settings save failed: {:#}", e);
                }
            }
            Err(e) => warn!("Settings load failed: {:#}", e),
        }
    }

    async fn update_model(&self, model: ModelProfile) {
        let _inner = self.inner.lock().await;
        match self.shared.repository.load_settings().await {
            Ok(mut settings) => {
                settings.model = model;
                if let Err(e) = self.shared.repository.save_settings(settings).await {
                    warn!("Settings save failed: {:#}", e);
                }
            }
            Err(e) => warn!("Settings load failed: {:#}", e),
        }
    }

    fn state(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    fn transcripts(&self) -> broadcast::Receiver<TranslationContent> {
        self.shared.transcript_tx.subscribe()
    }
}
