use serde::{Deserialize, Serialize};

use crate::language::LanguageDirection;
use crate::session::ModelProfile;

/// ICE relay/traversal server descriptor handed back by the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    /// Well-known public STUN fallback, used when the control plane supplies
    /// no ICE servers of its own.
    pub fn default_stun() -> Self {
        Self {
            urls: vec!["stun:stun.l.google.com:19302".to_string()],
            username: None,
            credential: None,
        }
    }
}

/// `POST session/start` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub direction: String,
    pub model: String,
    pub offline_fallback: bool,
}

impl StartSessionRequest {
    pub fn new(direction: &LanguageDirection, model: &ModelProfile, offline_fallback: bool) -> Self {
        Self {
            direction: direction.id(),
            model: model.name().to_string(),
            offline_fallback,
        }
    }
}

/// `POST session/start` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: String,
    /// Server-side SDP offer the client answers
    pub webrtc_sdp: String,
    /// Client secret authorizing the event stream
    pub token: String,
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
}

/// `POST session/update` request body; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webrtc_answer: Option<String>,
}

/// `POST session/stop` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopSessionRequest {
    pub session_id: String,
}

/// `POST session/metrics` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetricsRequest {
    pub session_id: String,
    /// Approximate round-trip latency in milliseconds
    pub latency: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}
