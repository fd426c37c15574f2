use std::collections::HashMap;

use serde::Serialize;

/// Wire shape of a generated log frame. Matches what the processor
/// side expects field for field.
#[derive(Debug, Clone, Serialize)]
pub struct Log {
    pub timestamp: i64,
    pub level: String,
    pub message: String,
    pub service: String,
    pub component: String,
    pub trace_id: String,
    pub span_id: String,
    pub parent_id: String,
}

/// The levels the downstream aggregation accepts.
pub const LEVELS: [&str; 3] = ["INFO", "WARN", "ERROR"];

const SERVICES: [&str; 4] = ["auth", "orders", "payments", "notifications"];

const COMPONENTS: [&str; 10] = [
    "db", "api", "cache", "worker", "scheduler", "gateway", "service", "client", "middleware",
    "utils",
];

const MESSAGES: [&str; 22] = [
    "user login successful",
    "user login failed",
    "order created",
    "payment declined",
    "cache miss",
    "db connection lost",
    "service started",
    "service stopped",
    "service restarted",
    "service crashed",
    "service recovered",
    "service updated",
    "request received",
    "request processed",
    "request failed",
    "request timed out",
    "request cancelled",
    "request started",
    "request completed",
    "system error",
    "system warning",
    "system info",
];

/// Weighted choice over the three levels.
pub struct WeightedPicker {
    items: Vec<&'static str>,
    weights: Vec<u32>,
    total: u32,
}

impl WeightedPicker {
    /// Levels with zero or absent weight are excluded entirely; if
    /// nothing remains, all levels get equal weight.
    pub fn new(weights: &HashMap<String, u32>) -> Self {
        let mut items = Vec::new();
        let mut kept = Vec::new();
        let mut total = 0;

        for level in LEVELS {
            let weight = weights.get(level).copied().unwrap_or(0);
            if weight == 0 {
                continue;
            }
            items.push(level);
            kept.push(weight);
            total += weight;
        }

        if total == 0 {
            items = LEVELS.to_vec();
            kept = vec![1; LEVELS.len()];
            total = LEVELS.len() as u32;
        }

        Self {
            items,
            weights: kept,
            total,
        }
    }

    pub fn pick(&self) -> &'static str {
        let mut n = rand::random_range(0..self.total);
        for (item, weight) in self.items.iter().zip(&self.weights) {
            if n < *weight {
                return item;
            }
            n -= weight;
        }
        self.items[self.items.len() - 1]
    }
}

/// INFO-heavy default mix.
pub fn default_level_weights() -> HashMap<String, u32> {
    HashMap::from([
        ("INFO".to_string(), 70),
        ("WARN".to_string(), 20),
        ("ERROR".to_string(), 10),
    ])
}

/// Parse `"INFO:70,WARN:20,ERROR:10"` style overrides. Malformed or
/// zero-weight pairs are skipped; an empty result falls back to the
/// defaults.
pub fn parse_level_weights(raw: &str) -> HashMap<String, u32> {
    if raw.trim().is_empty() {
        return default_level_weights();
    }

    let mut out = HashMap::new();
    for part in raw.split(',') {
        let Some((level, weight)) = part.trim().split_once(':') else {
            continue;
        };
        let Ok(weight) = weight.trim().parse::<u32>() else {
            continue;
        };
        if weight == 0 {
            continue;
        }
        out.insert(level.trim().to_uppercase(), weight);
    }

    if out.is_empty() {
        default_level_weights()
    } else {
        out
    }
}

/// 16-character hex correlation ID.
pub fn random_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

pub fn random_service() -> &'static str {
    pick_from(&SERVICES)
}

/// A fresh randomized entry with the given level and service.
pub fn random_log(level: &str, service: &str) -> Log {
    Log {
        timestamp: chrono::Utc::now().timestamp_millis(),
        level: level.to_string(),
        message: pick_from(&MESSAGES).to_string(),
        service: service.to_string(),
        component: pick_from(&COMPONENTS).to_string(),
        trace_id: random_id(),
        span_id: random_id(),
        parent_id: random_id(),
    }
}

fn pick_from(options: &[&'static str]) -> &'static str {
    options[rand::random_range(0..options.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picker_only_yields_weighted_levels() {
        let weights = HashMap::from([("ERROR".to_string(), 5)]);
        let picker = WeightedPicker::new(&weights);

        for _ in 0..100 {
            assert_eq!(picker.pick(), "ERROR");
        }
    }

    #[test]
    fn test_picker_falls_back_to_uniform_on_empty_weights() {
        let picker = WeightedPicker::new(&HashMap::new());

        for _ in 0..100 {
            assert!(LEVELS.contains(&picker.pick()));
        }
    }

    #[test]
    fn test_parse_level_weights() {
        let weights = parse_level_weights("info:70, WARN:20,ERROR:10");
        assert_eq!(weights["INFO"], 70);
        assert_eq!(weights["WARN"], 20);
        assert_eq!(weights["ERROR"], 10);
    }

    #[test]
    fn test_parse_level_weights_skips_malformed_pairs() {
        let weights = parse_level_weights("INFO:abc,WARN:0,ERROR:3,junk");
        assert_eq!(weights.len(), 1);
        assert_eq!(weights["ERROR"], 3);
    }

    #[test]
    fn test_parse_level_weights_empty_falls_back() {
        assert_eq!(parse_level_weights(""), default_level_weights());
        assert_eq!(parse_level_weights("junk"), default_level_weights());
    }

    #[test]
    fn test_random_id_shape() {
        for _ in 0..20 {
            let id = random_id();
            assert_eq!(id.len(), 16);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_random_log_carries_overrides() {
        let log = random_log("WARN", "payments");

        assert_eq!(log.level, "WARN");
        assert_eq!(log.service, "payments");
        assert!(!log.message.is_empty());
        assert!(!log.component.is_empty());
        assert!(log.timestamp > 0);
    }

    #[test]
    fn test_log_serializes_to_expected_wire_shape() {
        let log = random_log("INFO", "orders");
        let value: serde_json::Value = serde_json::to_value(&log).unwrap();

        for key in [
            "timestamp", "level", "message", "service", "component", "trace_id", "span_id",
            "parent_id",
        ] {
            assert!(value.get(key).is_some(), "missing field {}", key);
        }
    }
}
