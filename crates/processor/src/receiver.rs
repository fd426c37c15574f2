use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::ReceiverError;
use crate::model::ControlFrame;
use crate::parser;
use crate::pool::WorkerPool;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type SharedSink = Arc<tokio::sync::Mutex<WsSink>>;

/// How many control frames get logged verbatim before going quiet.
const LOGGED_CONTROL_FRAMES: u64 = 3;
/// Self-report cadence: every this many frames...
const REPORT_EVERY_FRAMES: u64 = 100;
/// ...or after this long, whichever comes first.
const REPORT_INTERVAL: Duration = Duration::from_secs(2);

/// Running per-connection counters.
///
/// Every handled frame lands in exactly one bucket, so
/// `ignored + parse_errors + submitted + dropped == total` holds after
/// each frame.
#[derive(Debug, Default, Clone, Copy)]
struct FrameCounters {
    total: u64,
    parsed_ok: u64,
    parse_errors: u64,
    ignored: u64,
    submitted: u64,
    dropped: u64,
}

/// Owns one persistent stream to a log source: dials it, keeps it
/// alive, classifies inbound frames, and feeds validated entries to
/// the worker pool under a submission deadline.
pub struct Receiver {
    url: String,
    pool: Arc<WorkerPool>,
    config: ConnectionConfig,
}

impl Receiver {
    pub fn new(url: impl Into<String>, pool: Arc<WorkerPool>, config: ConnectionConfig) -> Self {
        Self {
            url: url.into(),
            pool,
            config,
        }
    }

    /// Connect and pump frames until the transport fails or the token
    /// fires.
    ///
    /// Returns `Ok(())` for an intentional, token-driven stop; `Err`
    /// carries connection establishment and read failures. Reconnect
    /// policy belongs to the caller.
    pub async fn run(&self, token: CancellationToken) -> Result<(), ReceiverError> {
        info!(url = %self.url, "connecting to log source");

        let handshake = Duration::from_secs(self.config.handshake_timeout_secs);
        let (socket, response) = match timeout(handshake, connect_async(self.url.as_str())).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => return Err(ReceiverError::Connect(e.to_string())),
            Err(_) => {
                return Err(ReceiverError::Connect(format!(
                    "handshake timed out after {:?}",
                    handshake
                )))
            }
        };
        info!(url = %self.url, status = %response.status(), "connected to log source");

        let (sink, stream) = socket.split();
        let sink: SharedSink = Arc::new(tokio::sync::Mutex::new(sink));

        // Keepalive pings ride the same connection but live in their
        // own task: a failed ping ends the keepalive, not the stream.
        let keepalive = tokio::spawn(keepalive_loop(
            sink.clone(),
            token.clone(),
            Duration::from_secs(self.config.ping_interval_secs),
            Duration::from_secs(self.config.control_deadline_secs),
        ));

        let result = self.read_loop(sink, stream, &token).await;

        keepalive.abort();
        result
    }

    async fn read_loop(
        &self,
        sink: SharedSink,
        mut stream: WsStream,
        token: &CancellationToken,
    ) -> Result<(), ReceiverError> {
        let control_deadline = Duration::from_secs(self.config.control_deadline_secs);

        let mut counters = FrameCounters::default();
        let mut last_report = Instant::now();

        loop {
            let message = tokio::select! {
                msg = stream.next() => msg,
                _ = token.cancelled() => {
                    info!(url = %self.url, "shutdown requested, closing connection");
                    let close = Message::Close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "shutdown".into(),
                    }));
                    let mut sink = sink.lock().await;
                    if timeout(control_deadline, sink.send(close)).await.is_err() {
                        debug!(url = %self.url, "close frame send timed out");
                    }
                    return Ok(());
                }
            };

            let raw: Vec<u8> = match message {
                Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
                Some(Ok(Message::Binary(data))) => data.to_vec(),
                Some(Ok(Message::Ping(data))) => {
                    // Answer promptly; pings never touch frame counters
                    let mut sink = sink.lock().await;
                    if timeout(control_deadline, sink.send(Message::Pong(data)))
                        .await
                        .is_err()
                    {
                        warn!(url = %self.url, "pong reply timed out");
                    }
                    continue;
                }
                Some(Ok(Message::Pong(_))) => {
                    debug!(url = %self.url, "pong received");
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => {
                    if token.is_cancelled() {
                        return Ok(());
                    }
                    return Err(ReceiverError::Read("connection closed by source".to_string()));
                }
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(e)) => {
                    if token.is_cancelled() {
                        return Ok(());
                    }
                    return Err(ReceiverError::Read(e.to_string()));
                }
            };

            self.process_frame(&raw, &mut counters).await;

            if counters.total % REPORT_EVERY_FRAMES == 0
                || last_report.elapsed() > REPORT_INTERVAL
            {
                self.report(&counters);
                last_report = Instant::now();
            }
        }
    }

    /// Classify one frame and settle it into exactly one counter
    /// bucket. Nothing here fails: bad frames only shift counters.
    async fn process_frame(&self, raw: &[u8], counters: &mut FrameCounters) {
        counters.total += 1;

        if is_control_frame(raw) {
            counters.ignored += 1;
            // Log the first few for debugging, then go quiet
            if counters.ignored <= LOGGED_CONTROL_FRAMES {
                if let Ok(frame) = serde_json::from_slice::<ControlFrame>(raw) {
                    info!(url = %self.url, status = %frame.status, "ignoring control frame");
                }
            }
            return;
        }

        match parser::parse(raw) {
            Ok(entry) => {
                counters.parsed_ok += 1;
                let deadline = Duration::from_millis(self.config.submit_timeout_ms);
                if self.pool.submit_with_timeout(entry, deadline).await {
                    counters.submitted += 1;
                } else {
                    counters.dropped += 1;
                }
            }
            Err(e) => {
                counters.parse_errors += 1;
                debug!(url = %self.url, "parse error: {}", e);
            }
        }
    }

    fn report(&self, counters: &FrameCounters) {
        let stats = self.pool.stats();
        info!(
            url = %self.url,
            total = counters.total,
            ok = counters.parsed_ok,
            parse_errors = counters.parse_errors,
            ignored = counters.ignored,
            submitted = counters.submitted,
            dropped = counters.dropped,
            queue = stats.queue_length,
            processed = stats.processed,
            workers = stats.worker_count,
            "ingest progress"
        );
    }
}

/// A frame with no `level` key is a control/status frame, not a log.
/// Anything that does not probe as a JSON object falls through to the
/// parser, which reports the decode failure.
fn is_control_frame(raw: &[u8]) -> bool {
    #[derive(serde::Deserialize)]
    struct Probe {
        level: Option<serde_json::Value>,
    }

    matches!(
        serde_json::from_slice::<Probe>(raw),
        Ok(Probe { level: None })
    )
}

/// Send a ping every `period`, each with its own send deadline.
///
/// A failed or timed-out ping ends this task only; the read loop keeps
/// the connection until the transport itself fails.
async fn keepalive_loop(
    sink: SharedSink,
    token: CancellationToken,
    period: Duration,
    deadline: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; the connection is fresh, skip it
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut sink = sink.lock().await;
                match timeout(deadline, sink.send(Message::Ping(Bytes::new()))).await {
                    Ok(Ok(())) => debug!("keepalive ping sent"),
                    Ok(Err(e)) => {
                        warn!("keepalive ping failed: {}", e);
                        return;
                    }
                    Err(_) => {
                        warn!("keepalive ping timed out after {:?}", deadline);
                        return;
                    }
                }
            }
            _ = token.cancelled() => return,
        }
    }
}
