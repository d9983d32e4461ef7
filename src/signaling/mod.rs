pub mod client;
pub mod messages;

pub use client::{HttpSignalingClient, SignalingApi};
pub use messages::{
    IceServer, SessionMetricsRequest, StartSessionRequest, StartSessionResponse,
    StopSessionRequest, UpdateSessionRequest,
};
