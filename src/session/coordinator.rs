use tokio::sync::{broadcast, watch};

use super::settings::{ModelProfile, SessionSettings};
use super::state::SessionState;
use crate::language::LanguageDirection;
use crate::translation::TranslationContent;

/// Common contract of the realtime and offline session coordinators.
///
/// Failures never cross this boundary as errors: unrecoverable problems
/// surface through `SessionState::error_message`, and `toggle_microphone` is
/// the only boolean-failure operation.
#[async_trait::async_trait]
pub trait SessionCoordinator: Send + Sync {
    /// Start a session. No-op when one is already active.
    async fn start(&self, settings: SessionSettings);

    /// Stop the session and release every held resource. Idempotent.
    async fn stop(&self);

    /// Flip the microphone. Turning it on requires an active session; returns
    /// whether the toggle was applied.
    async fn toggle_microphone(&self) -> bool;

    /// Switch the language pair. Local state updates immediately; informing
    /// the server is best-effort.
    async fn update_direction(&self, direction: LanguageDirection);

    /// Switch the model profile. Same contract as `update_direction`.
    async fn update_model(&self, model: ModelProfile);

    /// Continuously updated session state.
    fn state(&self) -> watch::Receiver<SessionState>;

    /// Finalized translation segments, at-most-once per caption event. The
    /// channel is bounded; lagging consumers skip old segments rather than
    /// blocking the producer.
    fn transcripts(&self) -> broadcast::Receiver<TranslationContent>;
}
