use serde::{Deserialize, Serialize};

use crate::language::LanguageDirection;
use crate::translation::TranslationContent;

/// Per-stage latency figures, in milliseconds.
///
/// `translation_ms` is elapsed time since the most recent audio frame that was
/// actually sent, not a per-event round trip; caption events carry no
/// correlation id, so this is an approximation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyMetrics {
    pub asr_ms: Option<u64>,
    pub translation_ms: Option<u64>,
    pub tts_ms: Option<u64>,
}

/// Observable state of a translation session.
///
/// Mutated only by the owning coordinator under its session lock; everyone
/// else sees it through a `watch` channel. Invariant: `is_microphone_open`
/// implies `is_active`.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Whether a session is currently running
    pub is_active: bool,

    /// Whether the microphone is currently feeding the session
    pub is_microphone_open: bool,

    /// Current language pair
    pub direction: LanguageDirection,

    /// Most recent finalized segment
    pub current_segment: Option<TranslationContent>,

    /// Round-trip latency figures
    pub latency: LatencyMetrics,

    /// Last unrecoverable failure, cleared on the next successful start
    pub error_message: Option<String>,
}

impl SessionState {
    /// Default-inactive state carrying an error message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_inactive() {
        let state = SessionState::default();
        assert!(!state.is_active);
        assert!(!state.is_microphone_open);
        assert!(state.current_segment.is_none());
        assert!(state.error_message.is_none());
    }

    #[test]
    fn failed_state_keeps_message_only() {
        let state = SessionState::failed("microphone permission denied");
        assert!(!state.is_active);
        assert_eq!(
            state.error_message.as_deref(),
            Some("microphone permission denied")
        );
    }
}
