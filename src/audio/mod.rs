pub mod gateway;
pub mod loopback;

pub use gateway::{AudioGateway, BYTES_PER_SAMPLE, CHANNELS, SAMPLE_RATE};
pub use loopback::LoopbackGateway;
