use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tracing::info;

use super::gateway::AudioGateway;

/// Scripted in-process gateway: capture replays queued buffers, playback is
/// collected into a buffer. Backs the integration tests and the demo binary.
pub struct LoopbackGateway {
    capturing: Arc<AtomicBool>,
    queued: tokio::sync::Mutex<VecDeque<Vec<u8>>>,
    played: tokio::sync::Mutex<Vec<Vec<u8>>>,
    /// When set, `start_capture` fails with this message (capability errors).
    capture_error: tokio::sync::Mutex<Option<String>>,
}

impl LoopbackGateway {
    pub fn new() -> Self {
        Self {
            capturing: Arc::new(AtomicBool::new(false)),
            queued: tokio::sync::Mutex::new(VecDeque::new()),
            played: tokio::sync::Mutex::new(Vec::new()),
            capture_error: tokio::sync::Mutex::new(None),
        }
    }

    /// Queue a PCM buffer to be delivered by the next capture run.
    pub async fn queue_capture(&self, pcm: Vec<u8>) {
        self.queued.lock().await.push_back(pcm);
    }

    /// Make the next `start_capture` fail, simulating a denied permission.
    pub async fn fail_next_capture(&self, message: impl Into<String>) {
        *self.capture_error.lock().await = Some(message.into());
    }

    /// Buffers handed to `play_audio`, oldest first.
    pub async fn played(&self) -> Vec<Vec<u8>> {
        self.played.lock().await.clone()
    }
}

impl Default for LoopbackGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AudioGateway for LoopbackGateway {
    async fn start_capture(&self) -> Result<mpsc::Receiver<Vec<u8>>> {
        if let Some(message) = self.capture_error.lock().await.take() {
            bail!("{}", message);
        }

        // Exclusive device: a second start while capturing hands back an
        // empty stream instead of a second device.
        if self.capturing.swap(true, Ordering::SeqCst) {
            info!("Capture already running, ignoring duplicate start");
            let (_tx, rx) = mpsc::channel(1);
            return Ok(rx);
        }

        let buffers: Vec<Vec<u8>> = self.queued.lock().await.drain(..).collect();
        let (tx, rx) = mpsc::channel(buffers.len().max(1));
        for pcm in buffers {
            // Capacity matches the queue, so this cannot fail.
            let _ = tx.send(pcm).await;
        }
        Ok(rx)
    }

    async fn stop_capture(&self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn play_audio(&self, pcm: &[u8], _sample_rate: u32) -> Result<()> {
        self.played.lock().await.push(pcm.to_vec());
        Ok(())
    }

    async fn release_playback(&self) -> Result<()> {
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn capture_replays_queued_buffers() {
        let gateway = LoopbackGateway::new();
        gateway.queue_capture(vec![1, 2, 3]).await;
        gateway.queue_capture(vec![4, 5]).await;

        let mut rx = gateway.start_capture().await.unwrap();
        assert_eq!(rx.recv().await, Some(vec![1, 2, 3]));
        assert_eq!(rx.recv().await, Some(vec![4, 5]));
        assert!(gateway.is_capturing());

        gateway.stop_capture().await.unwrap();
        assert!(!gateway.is_capturing());
    }

    #[tokio::test]
    async fn duplicate_start_does_not_open_second_device() {
        let gateway = LoopbackGateway::new();
        let _first = gateway.start_capture().await.unwrap();
        let mut second = gateway.start_capture().await.unwrap();
        // The duplicate receiver is empty and closed.
        assert_eq!(second.recv().await, None);
    }

    #[tokio::test]
    async fn injected_capture_failure_surfaces() {
        let gateway = LoopbackGateway::new();
        gateway.fail_next_capture("microphone permission denied").await;
        let err = gateway.start_capture().await.unwrap_err();
        assert!(err.to_string().contains("permission"));
        assert!(!gateway.is_capturing());
    }
}
