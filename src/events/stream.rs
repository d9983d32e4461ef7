use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};
use url::Url;

use super::config::EventStreamConfig;
use super::envelope::{classify_event, ParsedEvent};
use crate::translation::TranslationContent;

type WsSink = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<TcpStream>>,
    Message,
>;

/// Terminal causes for the event stream.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    #[error("session terminated by server: {0}")]
    SessionEnded(String),

    #[error("event stream gave up after {0} reconnect attempts")]
    RetriesExhausted(u32),

    #[error("malformed event payload: {0}")]
    Deserialization(String),
}

/// Exponential backoff schedule for reconnects.
///
/// The Nth scheduled delay (ignoring jitter) is
/// `min(initial * multiplier^(N-1), max)`. The attempt counter advances only
/// when a reconnect actually executes, not when one is merely scheduled.
#[derive(Debug)]
pub struct ReconnectState {
    current_delay: Duration,
    attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    max_attempts: u32,
}

impl ReconnectState {
    pub fn new(config: &EventStreamConfig) -> Self {
        Self {
            current_delay: config.initial_retry_delay(),
            attempts: 0,
            initial_delay: config.initial_retry_delay(),
            max_delay: config.max_retry_delay(),
            multiplier: config.retry_multiplier,
            max_attempts: config.max_reconnect_attempts,
        }
    }

    /// Reset after a successful connection.
    pub fn reset(&mut self) {
        self.current_delay = self.initial_delay;
        self.attempts = 0;
    }

    /// Whether the attempt budget is spent (0 means unlimited).
    pub fn exhausted(&self) -> bool {
        self.max_attempts > 0 && self.attempts >= self.max_attempts
    }

    /// Delay to sleep before the next reconnect, then advance the schedule.
    pub fn next_delay(&mut self, jitter: Duration) -> Duration {
        let scheduled = (self.current_delay + jitter).min(self.max_delay);
        self.current_delay = self
            .current_delay
            .mul_f64(self.multiplier)
            .min(self.max_delay);
        scheduled
    }

    /// Count one executed reconnect, immediately before connecting.
    pub fn register_attempt(&mut self) {
        self.attempts += 1;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Derive the duplex event URL from the signaling base address.
///
/// The scheme is upgraded to its duplex variant (`http → ws`, `https → wss`);
/// session id and token travel as query parameters.
pub fn events_url(base: &Url, path: &str, session_id: &str, token: &str) -> Result<Url> {
    let mut url = base
        .join(path)
        .with_context(|| format!("Invalid event stream path: {}", path))?;

    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => other,
    }
    .to_string();
    url.set_scheme(&scheme)
        .map_err(|_| anyhow::anyhow!("Cannot upgrade scheme of {}", url))?;

    url.query_pairs_mut()
        .append_pair("sessionId", session_id)
        .append_pair("token", token);

    Ok(url)
}

/// Auto-reconnecting caption event stream, independent of the media path.
pub struct EventStream {
    base_url: Url,
    config: EventStreamConfig,
}

impl EventStream {
    pub fn new(base_url: Url, config: EventStreamConfig) -> Self {
        Self { base_url, config }
    }

    /// Open a lazy, infinite caption sequence for a session.
    ///
    /// The subscription ends only when the consumer cancels it or a terminal
    /// condition occurs (server terminal event, exhausted reconnects, or a
    /// strict-mode parse failure); transient disconnects reconnect
    /// transparently with jittered exponential backoff.
    pub fn listen(&self, session_id: &str, token: &str) -> Result<EventSubscription> {
        let url = events_url(&self.base_url, &self.config.path, session_id, token)?;
        let (tx, rx) = mpsc::channel(32);
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancel_notify = Arc::new(Notify::new());

        let task = tokio::spawn(run_stream(
            url,
            self.config.clone(),
            Arc::clone(&cancelled),
            Arc::clone(&cancel_notify),
            tx,
        ));

        Ok(EventSubscription {
            rx,
            cancelled,
            cancel_notify,
            task: Some(task),
        })
    }
}

/// Consumer handle for one `listen()` invocation.
pub struct EventSubscription {
    rx: mpsc::Receiver<Result<TranslationContent, StreamError>>,
    cancelled: Arc<AtomicBool>,
    cancel_notify: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl EventSubscription {
    /// Next caption, or the terminal cause, or None once the stream is over.
    pub async fn next(&mut self) -> Option<Result<TranslationContent, StreamError>> {
        self.rx.recv().await
    }

    /// Cancel the stream: disables reconnection, cancels heartbeat and any
    /// pending reconnect sleep, and closes the active socket with a normal
    /// closure. Idempotent against concurrent close callbacks.
    pub async fn cancel(mut self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.cancel_notify.notify_one();
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Event stream task panicked: {}", e);
                }
            }
        }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        // Dropping without cancel() still stops reconnection; the task sees
        // the flag (or the closed channel) and winds down on its own.
        self.cancelled.store(true, Ordering::SeqCst);
        self.cancel_notify.notify_one();
    }
}

/// Outcome of driving one open socket.
enum SocketOutcome {
    /// Connection lost; reconnect if still allowed
    Disconnected,
    /// Server-signalled end or strict-mode parse failure
    Terminal(StreamError),
    /// Consumer cancelled or dropped the subscription
    Cancelled,
}

async fn run_stream(
    url: Url,
    config: EventStreamConfig,
    cancelled: Arc<AtomicBool>,
    cancel_notify: Arc<Notify>,
    tx: mpsc::Sender<Result<TranslationContent, StreamError>>,
) {
    let mut backoff = ReconnectState::new(&config);

    loop {
        if cancelled.load(Ordering::SeqCst) {
            return;
        }

        let connect = tokio::select! {
            _ = cancel_notify.notified() => return,
            result = connect_async(url.as_str()) => result,
        };

        match connect {
            Ok((socket, _)) => {
                info!("Event stream connected: {}", url);
                backoff.reset();

                match drive_socket(socket, &config, &cancel_notify, &tx).await {
                    SocketOutcome::Cancelled => return,
                    SocketOutcome::Terminal(cause) => {
                        let _ = tx.send(Err(cause)).await;
                        return;
                    }
                    SocketOutcome::Disconnected => {
                        warn!("Event stream disconnected");
                    }
                }
            }
            Err(e) => {
                warn!("Event stream connect failed: {}", e);
            }
        }

        if cancelled.load(Ordering::SeqCst) {
            return;
        }
        if backoff.exhausted() {
            let _ = tx
                .send(Err(StreamError::RetriesExhausted(backoff.attempts())))
                .await;
            return;
        }

        let jitter = if config.jitter_ceiling_ms > 0 {
            Duration::from_millis(rand::thread_rng().gen_range(0..config.jitter_ceiling_ms))
        } else {
            Duration::ZERO
        };
        let delay = backoff.next_delay(jitter);
        info!(
            "Reconnecting event stream in {:?} (attempt {})",
            delay,
            backoff.attempts() + 1
        );

        tokio::select! {
            _ = cancel_notify.notified() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        backoff.register_attempt();
    }
}

async fn drive_socket(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    config: &EventStreamConfig,
    cancel_notify: &Notify,
    tx: &mpsc::Sender<Result<TranslationContent, StreamError>>,
) -> SocketOutcome {
    let (mut write, mut read) = socket.split();
    let close_once = AtomicBool::new(false);

    let heartbeat_payload = config.heartbeat_payload.clone().unwrap_or_default();
    let mut heartbeat = config.heartbeat_interval().map(|period| {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });
    if let Some(interval) = heartbeat.as_mut() {
        // First tick fires immediately; skip it so heartbeats start one
        // period after open.
        interval.tick().await;
    }

    loop {
        tokio::select! {
            _ = cancel_notify.notified() => {
                close_socket(&mut write, &close_once).await;
                return SocketOutcome::Cancelled;
            }

            _ = async {
                match heartbeat.as_mut() {
                    Some(interval) => { interval.tick().await; }
                    None => std::future::pending::<()>().await,
                }
            } => {
                if write
                    .send(Message::Text(heartbeat_payload.clone()))
                    .await
                    .is_err()
                {
                    // The socket failure itself drives the reconnect path.
                    warn!("Heartbeat send failed, stopping heartbeat");
                    heartbeat = None;
                }
            }

            frame = read.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => continue,
                    },
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        return SocketOutcome::Disconnected;
                    }
                    Some(Ok(_)) => continue,
                };

                match classify_event(&text) {
                    Ok(ParsedEvent::KeepAlive) | Ok(ParsedEvent::Ignored) => {}
                    Ok(ParsedEvent::Terminal(kind)) => {
                        close_socket(&mut write, &close_once).await;
                        return SocketOutcome::Terminal(StreamError::SessionEnded(kind));
                    }
                    Ok(ParsedEvent::Translation(content)) => {
                        if tx.send(Ok(content)).await.is_err() {
                            // Consumer gone; same teardown as an explicit cancel.
                            close_socket(&mut write, &close_once).await;
                            return SocketOutcome::Cancelled;
                        }
                    }
                    Err(e) => {
                        if config.strict_deserialization {
                            close_socket(&mut write, &close_once).await;
                            return SocketOutcome::Terminal(StreamError::Deserialization(
                                e.to_string(),
                            ));
                        }
                        warn!("Dropping malformed event: {}", e);
                    }
                }
            }
        }
    }
}

/// Send the normal-closure frame at most once per socket.
async fn close_socket(write: &mut WsSink, close_once: &AtomicBool) {
    if close_once.swap(true, Ordering::SeqCst) {
        return;
    }
    let _ = write
        .send(Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "client cancelled".into(),
        })))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(initial_ms: u64, max_ms: u64, multiplier: f64, max_attempts: u32) -> EventStreamConfig {
        EventStreamConfig {
            initial_retry_delay_ms: initial_ms,
            max_retry_delay_ms: max_ms,
            retry_multiplier: multiplier,
            max_reconnect_attempts: max_attempts,
            ..EventStreamConfig::default()
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut state = ReconnectState::new(&config(1_000, 30_000, 2.0, 0));

        let delays: Vec<u64> = (0..8)
            .map(|_| state.next_delay(Duration::ZERO).as_millis() as u64)
            .collect();
        assert_eq!(
            delays,
            vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000, 30_000]
        );
    }

    #[test]
    fn jitter_is_capped_by_max_delay() {
        let mut state = ReconnectState::new(&config(29_900, 30_000, 2.0, 0));
        let delay = state.next_delay(Duration::from_millis(500));
        assert_eq!(delay, Duration::from_millis(30_000));
    }

    #[test]
    fn reset_restores_initial_schedule() {
        let mut state = ReconnectState::new(&config(1_000, 30_000, 2.0, 0));
        state.next_delay(Duration::ZERO);
        state.next_delay(Duration::ZERO);
        state.register_attempt();
        state.reset();

        assert_eq!(state.attempts(), 0);
        assert_eq!(state.next_delay(Duration::ZERO), Duration::from_millis(1_000));
    }

    #[test]
    fn attempt_budget_exhausts() {
        let mut state = ReconnectState::new(&config(10, 100, 2.0, 3));

        // Three reconnects execute, the fourth failure finds the budget spent.
        for _ in 0..3 {
            assert!(!state.exhausted());
            state.next_delay(Duration::ZERO);
            state.register_attempt();
        }
        assert!(state.exhausted());
    }

    #[test]
    fn zero_max_attempts_never_exhausts() {
        let mut state = ReconnectState::new(&config(10, 100, 2.0, 0));
        for _ in 0..1_000 {
            state.register_attempt();
        }
        assert!(!state.exhausted());
    }

    #[test]
    fn events_url_upgrades_scheme_and_carries_credentials() {
        let base = Url::parse("https://api.example.com/v1/").unwrap();
        let url = events_url(&base, "session/events", "sess-1", "tok-9").unwrap();

        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/v1/session/events");
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(query.contains(&("sessionId".to_string(), "sess-1".to_string())));
        assert!(query.contains(&("token".to_string(), "tok-9".to_string())));
    }

    #[test]
    fn events_url_plain_http_maps_to_ws() {
        let base = Url::parse("http://127.0.0.1:8080/").unwrap();
        let url = events_url(&base, "session/events", "s", "t").unwrap();
        assert_eq!(url.scheme(), "ws");
    }

    #[test]
    fn close_guard_fires_exactly_once() {
        let guard = AtomicBool::new(false);
        assert!(!guard.swap(true, Ordering::SeqCst));
        assert!(guard.swap(true, Ordering::SeqCst));
    }
}
