use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::Query;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::generator::{self, WeightedPicker};

const MIN_INTERVAL_MS: u64 = 10;
const MAX_INTERVAL_MS: u64 = 10_000;
const DEFAULT_INTERVAL_MS: u64 = 100;

/// Per-connection stream tuning, straight from the query string.
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    /// Emission period, clamped to 10..=10000.
    interval_ms: Option<u64>,
    /// Fixed service instead of a random one.
    service: Option<String>,
    /// Fixed level instead of the weighted pick.
    level: Option<String>,
    /// "INFO:70,WARN:20,ERROR:10" style distribution override.
    level_weights: Option<String>,
    /// Log every emitted frame (debug=true).
    #[serde(default)]
    debug: bool,
}

pub fn router() -> Router {
    Router::new()
        .route("/ws/logs", get(ws_logs_handler))
        .route("/health", get(health_handler))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn ws_logs_handler(ws: WebSocketUpgrade, Query(params): Query<StreamParams>) -> Response {
    ws.on_upgrade(move |socket| stream_logs(socket, params))
}

/// Emit one randomized log frame per tick until the client goes away.
/// The socket is read concurrently so pings are answered and
/// disconnects are noticed between ticks.
async fn stream_logs(mut socket: WebSocket, params: StreamParams) {
    let interval_ms = params
        .interval_ms
        .unwrap_or(DEFAULT_INTERVAL_MS)
        .clamp(MIN_INTERVAL_MS, MAX_INTERVAL_MS);
    let fixed_service = params.service.filter(|s| !s.trim().is_empty());
    let fixed_level = params
        .level
        .map(|l| l.trim().to_uppercase())
        .filter(|l| !l.is_empty());
    let weights = params
        .level_weights
        .as_deref()
        .map(generator::parse_level_weights)
        .unwrap_or_else(generator::default_level_weights);
    let picker = WeightedPicker::new(&weights);

    info!(interval_ms, "log stream started");

    // Connection confirmation; interval_ms is string-typed on the wire
    let control = json!({
        "status": "connected",
        "interval_ms": interval_ms.to_string(),
    });
    if socket
        .send(Message::Text(control.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let level = fixed_level
                    .clone()
                    .unwrap_or_else(|| picker.pick().to_string());
                let service = fixed_service
                    .clone()
                    .unwrap_or_else(|| generator::random_service().to_string());

                let entry = generator::random_log(&level, &service);
                let frame = match serde_json::to_string(&entry) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("failed to encode log entry: {}", e);
                        continue;
                    }
                };

                if params.debug {
                    debug!(%frame, "sending log");
                }
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    info!("client disconnected");
                    return;
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => {
                        info!("client closed the stream");
                        return;
                    }
                    // Pings are answered by the library; everything
                    // else from the client is irrelevant here
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("client connection error: {}", e);
                        return;
                    }
                }
            }
        }
    }
}
