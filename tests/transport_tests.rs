// WebRTC transport tests that stay entirely on the local host: peer
// connection construction, reuse, and closed-state behavior need no network.

use voicebridge::signaling::IceServer;
use voicebridge::transport::PeerTransport;
use voicebridge::WebRtcTransport;

#[tokio::test]
async fn second_create_keeps_existing_connection() {
    let transport = WebRtcTransport::new();
    let servers = [IceServer::default_stun()];

    transport.create_peer_connection(&servers).await.unwrap();
    // Same call again is a no-op, not an error and not a rebuild.
    transport.create_peer_connection(&servers).await.unwrap();

    transport.close().await.unwrap();
}

#[tokio::test]
async fn send_without_connection_reports_frame_unsent() {
    let transport = WebRtcTransport::new();
    let sent = transport.send_audio_frame(&[0u8; 320]).await.unwrap();
    assert!(!sent);
}

#[tokio::test]
async fn negotiation_requires_a_connection() {
    let transport = WebRtcTransport::new();
    assert!(transport.set_remote_description("v=0").await.is_err());
    assert!(transport.create_answer().await.is_err());
}

#[tokio::test]
async fn close_is_safe_when_nothing_is_open() {
    let transport = WebRtcTransport::new();
    transport.close().await.unwrap();
    transport.close().await.unwrap();
}

#[tokio::test]
async fn send_after_close_reports_frame_unsent() {
    let transport = WebRtcTransport::new();
    transport
        .create_peer_connection(&[IceServer::default_stun()])
        .await
        .unwrap();
    transport.close().await.unwrap();

    let sent = transport.send_audio_frame(&[0u8; 320]).await.unwrap();
    assert!(!sent);
}
