use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::language::Language;

/// How the source audio entered the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    Voice,
    Text,
}

impl InputMode {
    /// Parse a wire value, defaulting to voice for absent or unrecognized modes.
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("text") => InputMode::Text,
            _ => InputMode::Voice,
        }
    }
}

/// One finalized translation segment.
///
/// Produced once per caption event, then forwarded unchanged to the transcript
/// stream and to history persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationContent {
    /// Transcribed source-language text
    pub transcript: String,

    /// Translated target-language text
    pub translation: String,

    /// Local path of synthesized target audio, if the server provided any
    pub audio_path: Option<String>,

    /// When this segment was received
    pub timestamp: DateTime<Utc>,

    /// Source language detected by the server, if reported
    pub detected_source: Option<Language>,

    /// Target language of the translation
    pub target_language: Language,

    /// Input modality for this segment
    pub input_mode: InputMode,
}

impl TranslationContent {
    /// True when there is nothing worth surfacing to a consumer.
    pub fn is_blank(&self) -> bool {
        self.transcript.trim().is_empty() && self.translation.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_mode_defaults_to_voice() {
        assert_eq!(InputMode::from_wire(None), InputMode::Voice);
        assert_eq!(InputMode::from_wire(Some("hologram")), InputMode::Voice);
        assert_eq!(InputMode::from_wire(Some("text")), InputMode::Text);
    }

    #[test]
    fn blank_detection_ignores_whitespace() {
        let content = TranslationContent {
            transcript: "  ".to_string(),
            translation: String::new(),
            audio_path: None,
            timestamp: Utc::now(),
            detected_source: None,
            target_language: Language::new("en"),
            input_mode: InputMode::Voice,
        };
        assert!(content.is_blank());
    }
}
