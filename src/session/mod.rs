//! Translation session management
//!
//! This module provides the session coordinators:
//! - `RealtimeCoordinator`: signaling, peer-transport negotiation, audio
//!   piping, and caption consumption for a networked session
//! - `OfflineCoordinator`: the same contract backed by an on-device engine
//! - Shared observable `SessionState` and the `SessionCoordinator` trait

mod coordinator;
mod offline;
mod realtime;
mod settings;
mod state;

pub use coordinator::SessionCoordinator;
pub use offline::{OfflineCoordinator, OfflineSegment, TranscriptionEngine};
pub use realtime::RealtimeCoordinator;
pub use settings::{ModelProfile, SessionSettings};
pub use state::{LatencyMetrics, SessionState};
