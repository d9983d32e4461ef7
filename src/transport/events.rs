use serde::{Deserialize, Serialize};

/// Coarse health of the peer connection, derived from the platform
/// connection-state callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionHealth {
    Connecting,
    Connected,
    Failed,
    Closed,
}

/// The transport events the coordinator actually consumes; everything else on
/// the platform observer surface stays inside the transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    ConnectionStateChanged(ConnectionHealth),
    DataChannelMessage(String),
}
