//! Call counting and request history.

use std::sync::Arc;

use dashmap::DashMap;

use crate::recording::snapshot::CallRecord;
use crate::routing::RouteKey;

#[derive(Debug, Default)]
struct LedgerEntry {
    count: usize,
    records: Vec<CallRecord>,
}

/// A thread-safe call counter and history store keyed by route.
///
/// Each key's entry is guarded by its DashMap shard lock, so updates to the
/// same key serialize while different keys proceed independently.
#[derive(Debug, Clone, Default)]
pub struct CallLedger {
    entries: Arc<DashMap<RouteKey, LedgerEntry>>,
}

impl CallLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one to the counter for `key`.
    pub fn increment(&self, key: &RouteKey) {
        self.entries.entry(key.clone()).or_default().count += 1;
    }

    /// Append a record without touching the counter.
    pub fn append_record(&self, key: &RouteKey, record: CallRecord) {
        self.entries.entry(key.clone()).or_default().records.push(record);
    }

    /// Count and store a call in one step.
    pub fn record(&self, key: &RouteKey, record: CallRecord) {
        let mut entry = self.entries.entry(key.clone()).or_default();
        entry.count += 1;
        entry.records.push(record);
    }

    /// Calls since the last reset; 0 for unknown keys.
    pub fn count(&self, key: &RouteKey) -> usize {
        self.entries.get(key).map(|e| e.count).unwrap_or(0)
    }

    /// Stored records in arrival order; empty for unknown keys.
    pub fn records(&self, key: &RouteKey) -> Vec<CallRecord> {
        self.entries
            .get(key)
            .map(|e| e.records.clone())
            .unwrap_or_default()
    }

    /// Sum of all counters.
    pub fn total_calls(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Zero every counter. Records are kept.
    pub fn reset_counts(&self) {
        for mut entry in self.entries.iter_mut() {
            entry.count = 0;
        }
    }

    /// Zero every counter and drop every record.
    pub fn reset_counts_and_records(&self) {
        for mut entry in self.entries.iter_mut() {
            entry.count = 0;
            entry.records.clear();
        }
    }

    /// Forget every key.
    pub fn clear(&self) {
        self.entries.clear();
    }
}
