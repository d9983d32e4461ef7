pub mod audio;
pub mod config;
pub mod events;
pub mod language;
pub mod repository;
pub mod session;
pub mod signaling;
pub mod translation;
pub mod transport;

pub use audio::{AudioGateway, LoopbackGateway};
pub use config::Config;
pub use events::{EventStream, EventStreamConfig, EventSubscription, StreamError};
pub use language::{Language, LanguageDirection};
pub use repository::{MemoryRepository, Repository, UserSettings};
pub use session::{
    LatencyMetrics, ModelProfile, OfflineCoordinator, RealtimeCoordinator, SessionCoordinator,
    SessionSettings, SessionState, TranscriptionEngine,
};
pub use signaling::{HttpSignalingClient, SignalingApi};
pub use translation::{InputMode, TranslationContent};
pub use transport::{PeerTransport, TransportEvent, WebRtcTransport};
