pub mod client;
pub mod events;

pub use client::{PeerTransport, WebRtcTransport};
pub use events::{ConnectionHealth, TransportEvent};
