// Offline fallback coordinator tests over a scripted on-device engine.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;
use voicebridge::session::{OfflineCoordinator, OfflineSegment, TranscriptionEngine};
use voicebridge::{
    AudioGateway, Language, LanguageDirection, LoopbackGateway, MemoryRepository, Repository,
    SessionCoordinator, SessionSettings,
};

/// Replays a scripted sequence of recognition results, one per PCM chunk.
#[derive(Default)]
struct ScriptedEngine {
    results: Mutex<VecDeque<Option<OfflineSegment>>>,
}

impl ScriptedEngine {
    async fn push(&self, result: Option<OfflineSegment>) {
        self.results.lock().await.push_back(result);
    }
}

#[async_trait::async_trait]
impl TranscriptionEngine for ScriptedEngine {
    async fn transcribe(
        &self,
        _pcm: &[u8],
        _direction: &LanguageDirection,
    ) -> Result<Option<OfflineSegment>> {
        Ok(self.results.lock().await.pop_front().flatten())
    }
}

struct Harness {
    audio: Arc<LoopbackGateway>,
    engine: Arc<ScriptedEngine>,
    repository: Arc<MemoryRepository>,
    coordinator: OfflineCoordinator,
}

fn harness() -> Harness {
    let audio = Arc::new(LoopbackGateway::new());
    let engine = Arc::new(ScriptedEngine::default());
    let repository = Arc::new(MemoryRepository::new());
    let coordinator = OfflineCoordinator::new(
        Arc::clone(&audio) as Arc<dyn AudioGateway>,
        Arc::clone(&engine) as Arc<dyn TranscriptionEngine>,
        Arc::clone(&repository) as Arc<dyn Repository>,
    );
    Harness {
        audio,
        engine,
        repository,
        coordinator,
    }
}

fn ja_to_en() -> SessionSettings {
    SessionSettings {
        direction: LanguageDirection::new(Some(Language::new("ja")), Language::new("en"))
            .unwrap(),
        ..SessionSettings::default()
    }
}

#[tokio::test]
async fn recognized_speech_is_emitted_and_recorded() {
    let h = harness();
    h.audio.queue_capture(vec![0u8; 320]).await;
    h.engine
        .push(Some(OfflineSegment {
            transcript: "konnichiwa".to_string(),
            translation: "hello".to_string(),
            detected_source: Some(Language::new("ja")),
        }))
        .await;

    let mut transcripts = h.coordinator.transcripts();
    h.coordinator.start(ja_to_en()).await;

    let content = tokio::time::timeout(Duration::from_secs(2), transcripts.recv())
        .await
        .expect("segment expected")
        .expect("broadcast open");
    assert_eq!(content.transcript, "konnichiwa");
    assert_eq!(content.translation, "hello");
    assert_eq!(content.target_language, Language::new("en"));
    assert_eq!(content.detected_source, Some(Language::new("ja")));

    tokio::time::sleep(Duration::from_millis(100)).await;
    let history = h.repository.history().await;
    assert_eq!(history.len(), 1);

    let state = h.coordinator.state().borrow().clone();
    assert!(state.is_active);
    assert_eq!(
        state.current_segment.map(|s| s.translation),
        Some("hello".to_string())
    );

    h.coordinator.stop().await;
}

#[tokio::test]
async fn silent_and_blank_chunks_are_skipped() {
    let h = harness();
    h.audio.queue_capture(vec![0u8; 320]).await;
    h.audio.queue_capture(vec![1u8; 320]).await;
    h.audio.queue_capture(vec![2u8; 320]).await;

    // No speech, then a blank result, then a real one.
    h.engine.push(None).await;
    h.engine
        .push(Some(OfflineSegment {
            transcript: "  ".to_string(),
            translation: String::new(),
            detected_source: None,
        }))
        .await;
    h.engine
        .push(Some(OfflineSegment {
            transcript: "hola".to_string(),
            translation: "hello".to_string(),
            detected_source: None,
        }))
        .await;

    let mut transcripts = h.coordinator.transcripts();
    h.coordinator.start(ja_to_en()).await;

    let content = tokio::time::timeout(Duration::from_secs(2), transcripts.recv())
        .await
        .expect("segment expected")
        .expect("broadcast open");
    assert_eq!(content.transcript, "hola");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.repository.history().await.len(), 1);

    h.coordinator.stop().await;
}

#[tokio::test]
async fn toggle_before_start_is_refused() {
    let h = harness();
    assert!(!h.coordinator.toggle_microphone().await);
    assert!(!h.audio.is_capturing());
}

#[tokio::test]
async fn capture_failure_surfaces_in_state() {
    let h = harness();
    h.audio.fail_next_capture("microphone permission denied").await;

    h.coordinator.start(ja_to_en()).await;

    let state = h.coordinator.state().borrow().clone();
    assert!(!state.is_active);
    assert!(state
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("permission"));
}

#[tokio::test]
async fn stop_resets_state_and_devices() {
    let h = harness();
    h.coordinator.start(ja_to_en()).await;
    assert!(h.audio.is_capturing());

    h.coordinator.stop().await;
    h.coordinator.stop().await;

    assert!(!h.audio.is_capturing());
    let state = h.coordinator.state().borrow().clone();
    assert!(!state.is_active);
    assert!(!state.is_microphone_open);
}

#[tokio::test]
async fn microphone_toggle_pauses_recognition() {
    let h = harness();
    h.coordinator.start(ja_to_en()).await;

    assert!(h.coordinator.toggle_microphone().await);
    assert!(!h.audio.is_capturing());
    assert!(!h.coordinator.state().borrow().is_microphone_open);

    assert!(h.coordinator.toggle_microphone().await);
    assert!(h.audio.is_capturing());

    h.coordinator.stop().await;
}
