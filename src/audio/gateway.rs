use anyhow::Result;
use tokio::sync::mpsc;

/// Fixed capture/playback format: 16 kHz, mono, 16-bit little-endian PCM.
pub const SAMPLE_RATE: u32 = 16_000;
pub const CHANNELS: u16 = 1;
pub const BYTES_PER_SAMPLE: usize = 2;

/// Platform audio facade.
///
/// Platform-specific implementations (mobile capture/playback primitives) live
/// outside this crate; coordinators only consume this surface. The capture and
/// playback devices are exclusive: one logical session holds them at a time,
/// and starting capture while already capturing is a flag-guarded no-op on the
/// implementation side, not an error.
#[async_trait::async_trait]
pub trait AudioGateway: Send + Sync {
    /// Start capturing microphone audio.
    ///
    /// Returns a channel receiver of raw PCM buffers in the fixed format.
    /// Fails synchronously on capability problems (missing microphone
    /// permission), which the coordinator surfaces as a start failure.
    async fn start_capture(&self) -> Result<mpsc::Receiver<Vec<u8>>>;

    /// Stop capturing. Safe to call when capture is not running.
    async fn stop_capture(&self) -> Result<()>;

    /// Queue a PCM buffer for playback.
    async fn play_audio(&self, pcm: &[u8], sample_rate: u32) -> Result<()>;

    /// Release the playback device. Safe to call when nothing is playing.
    async fn release_playback(&self) -> Result<()>;

    /// Whether capture is currently running.
    fn is_capturing(&self) -> bool;
}
