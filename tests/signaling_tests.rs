use voicebridge::language::{Language, LanguageDirection};
use voicebridge::session::ModelProfile;
use voicebridge::signaling::{
    IceServer, SessionMetricsRequest, StartSessionRequest, StartSessionResponse,
    UpdateSessionRequest,
};

#[test]
fn test_start_request_serialization() {
    let direction =
        LanguageDirection::new(Some(Language::new("ja")), Language::new("en")).unwrap();
    let request = StartSessionRequest::new(&direction, &ModelProfile::new("premium"), true);

    let json = serde_json::to_string(&request).unwrap();
    assert!(json.contains("\"direction\":\"ja-en\""));
    assert!(json.contains("\"model\":\"premium\""));
    assert!(json.contains("\"offlineFallback\":true"));
}

#[test]
fn test_start_response_deserialization() {
    let json = r#"{
        "sessionId": "sess-42",
        "webrtcSdp": "v=0\r\no=- 0 0 IN IP4 0.0.0.0",
        "token": "secret-token",
        "iceServers": [
            {"urls": ["stun:stun.example.com:3478"]},
            {"urls": ["turn:turn.example.com:3478"], "username": "u", "credential": "c"}
        ]
    }"#;

    let response: StartSessionResponse = serde_json::from_str(json).unwrap();
    assert_eq!(response.session_id, "sess-42");
    assert_eq!(response.token, "secret-token");
    assert_eq!(response.ice_servers.len(), 2);
    assert_eq!(response.ice_servers[1].username.as_deref(), Some("u"));
}

#[test]
fn test_start_response_without_ice_servers() {
    let json = r#"{"sessionId": "s", "webrtcSdp": "v=0", "token": "t"}"#;

    let response: StartSessionResponse = serde_json::from_str(json).unwrap();
    assert!(response.ice_servers.is_empty());
}

#[test]
fn test_update_request_omits_absent_fields() {
    let request = UpdateSessionRequest {
        session_id: "sess-1".to_string(),
        webrtc_answer: Some("v=0".to_string()),
        ..Default::default()
    };

    let json = serde_json::to_string(&request).unwrap();
    assert!(json.contains("\"sessionId\":\"sess-1\""));
    assert!(json.contains("\"webrtcAnswer\":\"v=0\""));
    assert!(!json.contains("model"));
    assert!(!json.contains("direction"));
}

#[test]
fn test_metrics_request_serialization() {
    let request = SessionMetricsRequest {
        session_id: "sess-1".to_string(),
        latency: 250,
        error_code: None,
    };

    let json = serde_json::to_string(&request).unwrap();
    assert!(json.contains("\"latency\":250"));
    assert!(!json.contains("errorCode"));
}

#[test]
fn test_default_stun_fallback() {
    let server = IceServer::default_stun();
    assert_eq!(server.urls, vec!["stun:stun.l.google.com:19302"]);
    assert!(server.username.is_none());
    assert!(server.credential.is_none());
}
