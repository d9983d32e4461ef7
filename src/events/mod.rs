//! Caption event stream
//!
//! A persistent duplex channel delivering translation and session-termination
//! events, independent of the peer media path. Reconnects transparently with
//! jittered exponential backoff and an optional outbound heartbeat.

pub mod config;
pub mod envelope;
pub mod stream;

pub use config::EventStreamConfig;
pub use envelope::{classify_event, EventEnvelope, ParsedEvent, TranslationPayload};
pub use stream::{events_url, EventStream, EventSubscription, ReconnectState, StreamError};
