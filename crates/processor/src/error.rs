use thiserror::Error;

/// Frame-level validation failures.
///
/// Contained at single-frame granularity: the read loop counts them
/// and moves on, the connection is never torn down for a bad frame.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid level: {0:?}")]
    InvalidLevel(String),

    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(i64),

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Connection-level failures, returned to whoever started the
/// receiver.
///
/// An intentional stop is not represented here: the receiver returns
/// `Ok(())` when the cancellation token fired, so callers can tell
/// "stopped on request" from "stream broke" by the Result alone.
#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("read failed: {0}")]
    Read(String),
}

/// Aggregation backend fault.
///
/// Logged by the worker that hit it; that one increment is lost and
/// the worker keeps draining.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("backend failure: {0}")]
    Backend(String),
}
