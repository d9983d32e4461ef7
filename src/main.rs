use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use voicebridge::{
    Config, EventStream, HttpSignalingClient, LoopbackGateway, MemoryRepository,
    RealtimeCoordinator, SessionCoordinator, WebRtcTransport,
};

#[derive(Parser)]
#[command(name = "voicebridge", about = "Realtime speech translation session core")]
struct Args {
    /// Path of the configuration file (without extension)
    #[arg(long, default_value = "config/voicebridge")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;
    let base_url = cfg.signaling_url()?;

    info!("voicebridge v0.1.0");
    info!("Signaling endpoint: {}", base_url);
    info!("Event stream path: {}", cfg.events.path);

    let signaling = Arc::new(HttpSignalingClient::new(base_url.clone()));
    let transport = Arc::new(WebRtcTransport::new());
    let audio = Arc::new(LoopbackGateway::new());
    let repository = Arc::new(MemoryRepository::new());
    let events = EventStream::new(base_url, cfg.events.clone());

    let coordinator =
        RealtimeCoordinator::new(signaling, transport, audio, repository, events);

    let state = coordinator.state();
    info!(
        "Coordinator ready: active={} direction={}",
        state.borrow().is_active,
        state.borrow().direction.id()
    );
    info!("Run against a live control plane to start a session");

    Ok(())
}
