use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::pool::WorkerPool;
use crate::storage::InMemoryStorage;

/// Shared handles for the HTTP surface.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<WorkerPool>,
    pub storage: Arc<InMemoryStorage>,
    /// Flipped when shutdown begins so readiness goes dark while
    /// in-flight requests drain.
    pub closing: Arc<AtomicBool>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(readiness_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
}

/// Process liveness only; 200 for as long as we can answer at all.
async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn readiness_handler(State(state): State<AppState>) -> impl IntoResponse {
    let closing = state.closing.load(Ordering::Relaxed);
    let status = if closing {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status, Json(json!({ "ready": !closing })))
}

/// Pool throughput and aggregate counts.
///
/// Fields are synchronized independently, so totals observed here may
/// be mid-update relative to each other.
async fn stats_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.pool.stats();

    Json(json!({
        "pool": {
            "processed": stats.processed,
            "queue_length": stats.queue_length,
            "workers": stats.worker_count,
        },
        "levels": state.storage.snapshot(),
        "total": state.storage.total(),
    }))
}
