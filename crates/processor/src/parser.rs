use chrono::Utc;

use crate::error::ParseError;
use crate::model::LogEntry;

/// Levels the aggregation pipeline accepts. A source may emit more
/// (DEBUG, FATAL, ...); those are rejected outright, never remapped.
const ALLOWED_LEVELS: [&str; 3] = ["INFO", "WARN", "ERROR"];

/// Timestamps must fall within a week of parse time, either direction.
/// Rejects obviously malformed or replayed data without requiring
/// clock synchronization with the source.
const TIMESTAMP_WINDOW_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Decode and validate a raw frame into a normalized [`LogEntry`].
///
/// Checks run in a fixed order — decode, level, timestamp, required
/// fields — and the first failure determines the reported error kind.
pub fn parse(raw: &[u8]) -> Result<LogEntry, ParseError> {
    parse_at(raw, Utc::now().timestamp_millis())
}

/// Same as [`parse`], against an explicit clock.
pub fn parse_at(raw: &[u8], now_ms: i64) -> Result<LogEntry, ParseError> {
    let mut entry: LogEntry = serde_json::from_slice(raw)?;

    entry.level = entry.level.trim().to_uppercase();
    if !ALLOWED_LEVELS.contains(&entry.level.as_str()) {
        return Err(ParseError::InvalidLevel(entry.level));
    }

    if entry.timestamp < now_ms - TIMESTAMP_WINDOW_MS
        || entry.timestamp > now_ms + TIMESTAMP_WINDOW_MS
    {
        return Err(ParseError::TimestampOutOfRange(entry.timestamp));
    }

    if entry.service.trim().is_empty() {
        return Err(ParseError::MissingField("service"));
    }
    if entry.message.trim().is_empty() {
        return Err(ParseError::MissingField("message"));
    }

    Ok(entry)
}
