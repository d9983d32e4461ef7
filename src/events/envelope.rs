use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::language::Language;
use crate::translation::{InputMode, TranslationContent};

/// Event types that only keep the connection warm.
const KEEPALIVE_TYPES: &[&str] = &["session.keepalive", "ping", "pong"];

/// Event types that end the session; the stream terminates without reconnect.
const TERMINAL_TYPES: &[&str] = &["session.ended", "session.failed", "session.closed"];

/// Event types carrying a finalized caption payload.
const TRANSLATION_TYPES: &[&str] = &["translation.result", "translation.completed"];

/// Wire envelope for every inbound event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Caption payload nested under `data` for translation events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslationPayload {
    pub transcript: Option<String>,
    pub translation: Option<String>,
    pub audio_url: Option<String>,
    pub detected_language: Option<String>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub input_mode: Option<String>,
}

/// Classification of one inbound event.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    /// Keep-alive; nothing is emitted
    KeepAlive,
    /// Session over; the stream terminates, carrying the event type as cause
    Terminal(String),
    /// A finalized caption to emit
    Translation(TranslationContent),
    /// Unrecognized type or blank payload; dropped silently
    Ignored,
}

/// Parse and classify a raw event frame.
///
/// Parse failures bubble up so the stream can apply its strict-mode policy.
pub fn classify_event(raw: &str) -> Result<ParsedEvent, serde_json::Error> {
    let envelope: EventEnvelope = serde_json::from_str(raw)?;

    if KEEPALIVE_TYPES.contains(&envelope.kind.as_str()) {
        return Ok(ParsedEvent::KeepAlive);
    }

    if TERMINAL_TYPES.contains(&envelope.kind.as_str()) {
        return Ok(ParsedEvent::Terminal(envelope.kind));
    }

    if TRANSLATION_TYPES.contains(&envelope.kind.as_str()) {
        let payload: TranslationPayload = match envelope.data {
            Some(data) => serde_json::from_value(data)?,
            None => return Ok(ParsedEvent::Ignored),
        };
        return Ok(match decode_translation(payload) {
            Some(content) => ParsedEvent::Translation(content),
            None => ParsedEvent::Ignored,
        });
    }

    Ok(ParsedEvent::Ignored)
}

/// Build a `TranslationContent` from a caption payload.
///
/// Returns None when both transcript and translation are blank: there is
/// nothing useful to surface. The detected source language comes from the
/// explicit field, falling back to the reported source language; a missing
/// target language maps to the ISO "undetermined" code.
fn decode_translation(payload: TranslationPayload) -> Option<TranslationContent> {
    let transcript = payload.transcript.unwrap_or_default();
    let translation = payload.translation.unwrap_or_default();
    if transcript.trim().is_empty() && translation.trim().is_empty() {
        return None;
    }

    let detected = payload
        .detected_language
        .or(payload.source_language)
        .filter(|code| !code.trim().is_empty())
        .map(Language::new);

    let target = payload
        .target_language
        .filter(|code| !code.trim().is_empty())
        .map(Language::new)
        .unwrap_or_else(|| Language::new("und"));

    Some(TranslationContent {
        transcript,
        translation,
        audio_path: payload.audio_url,
        timestamp: Utc::now(),
        detected_source: detected,
        target_language: target,
        input_mode: InputMode::from_wire(payload.input_mode.as_deref()),
    })
}
