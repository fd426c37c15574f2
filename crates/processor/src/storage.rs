use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::StorageError;

/// Aggregation sink the worker pool writes into.
///
/// Deliberately a single operation so a persistent backend can be
/// swapped in at construction time without touching the pool.
pub trait Storage: Send + Sync {
    fn increment_level_count(&self, service: &str, level: &str) -> Result<(), StorageError>;
}

/// Default in-memory backend: per-service, per-level counters behind
/// one coarse mutex. The raw map never leaves this type; consumers get
/// cloned snapshots.
#[derive(Default)]
pub struct InMemoryStorage {
    counts: Mutex<HashMap<String, HashMap<String, u64>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cloned snapshot of the aggregate counts, for the stats surface.
    pub fn snapshot(&self) -> HashMap<String, HashMap<String, u64>> {
        self.counts.lock().clone()
    }

    /// Total recorded increments across all services and levels.
    pub fn total(&self) -> u64 {
        self.counts
            .lock()
            .values()
            .flat_map(|levels| levels.values())
            .sum()
    }
}

impl Storage for InMemoryStorage {
    fn increment_level_count(&self, service: &str, level: &str) -> Result<(), StorageError> {
        let mut counts = self.counts.lock();
        *counts
            .entry(service.to_string())
            .or_default()
            .entry(level.to_string())
            .or_insert(0) += 1;
        Ok(())
    }
}
