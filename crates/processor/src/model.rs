use serde::{Deserialize, Serialize};

/// A structured log record as it arrives from a source.
///
/// Missing wire fields decode to their default values, so the parser's
/// validation pass is what rejects them: a frame without `service`
/// reports a missing field, not a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEntry {
    /// Unix milliseconds.
    pub timestamp: i64,
    /// Normalized to uppercase by the parser; one of INFO/WARN/ERROR
    /// once validated.
    pub level: String,
    pub message: String,
    pub service: String,
    pub component: String,
    // Correlation IDs, carried through but never validated.
    pub trace_id: String,
    pub span_id: String,
    pub parent_id: String,
}

/// Status frame a source sends once after connection establishment.
/// Recognized by the absence of a `level` field and discarded; never
/// handed to the parser.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ControlFrame {
    pub status: String,
    pub interval_ms: Option<IntervalMs>,
}

/// Sources emit `interval_ms` as either a bare number or a numeric
/// string; both are accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IntervalMs {
    Number(u64),
    Text(String),
}

/// Point-in-time view of the worker pool.
///
/// Each field is synchronized independently; the triple is
/// eventually-consistent, never an atomic snapshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PoolStats {
    pub processed: u64,
    pub queue_length: usize,
    pub worker_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_decodes_full_frame() {
        let raw = br#"{"timestamp":1700000000000,"level":"INFO","message":"order created","service":"orders","component":"api","trace_id":"a1b2c3d4e5f60708","span_id":"0102030405060708","parent_id":"1112131415161718"}"#;
        let entry: LogEntry = serde_json::from_slice(raw).unwrap();

        assert_eq!(entry.timestamp, 1_700_000_000_000);
        assert_eq!(entry.level, "INFO");
        assert_eq!(entry.service, "orders");
        assert_eq!(entry.trace_id, "a1b2c3d4e5f60708");
    }

    #[test]
    fn test_log_entry_missing_fields_default() {
        let entry: LogEntry = serde_json::from_slice(br#"{"level":"INFO"}"#).unwrap();

        assert_eq!(entry.timestamp, 0);
        assert!(entry.service.is_empty());
        assert!(entry.message.is_empty());
    }

    #[test]
    fn test_control_frame_interval_as_string_or_number() {
        let frame: ControlFrame =
            serde_json::from_slice(br#"{"status":"connected","interval_ms":"50"}"#).unwrap();
        assert_eq!(frame.status, "connected");
        assert!(matches!(frame.interval_ms, Some(IntervalMs::Text(ref s)) if s == "50"));

        let frame: ControlFrame =
            serde_json::from_slice(br#"{"status":"connected","interval_ms":50}"#).unwrap();
        assert!(matches!(frame.interval_ms, Some(IntervalMs::Number(50))));
    }
}
