//! Eviction Policy Module
//!
//! Decides which entries leave the store, and removes them.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::guard::classifier::EntryClassifier;
use crate::guard::clock::Clock;
use crate::guard::entry::size_bytes;
use crate::guard::events::{EventSink, GuardEvent};
use crate::store::KvStore;

/// Slack subtracted before rounding up, so `10 * 0.3` counts as 3 and not 4
const RATIO_EPSILON: f64 = 1e-9;

// == Eviction Mode ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionMode {
    Normal,
    Emergency,
}

impl fmt::Display for EvictionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionMode::Normal => write!(f, "normal"),
            EvictionMode::Emergency => write!(f, "emergency"),
        }
    }
}

// == Eviction Report ==
/// What one eviction pass or erasure removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    /// Keys actually removed, in deletion order
    pub deleted_keys: Vec<String>,
    /// Sum of the removed entries' sizes, measured just before removal
    pub bytes_freed: u64,
}

impl EvictionReport {
    pub fn deleted_count(&self) -> usize {
        self.deleted_keys.len()
    }
}

/// Number of normal entries a pass removes: `ceil(count * ratio)`, capped
/// at `count`.
pub fn reclaim_count(count: usize, ratio: f64) -> usize {
    if count == 0 || ratio <= 0.0 {
        return 0;
    }
    let exact = count as f64 * ratio;
    ((exact - RATIO_EPSILON).ceil().max(0.0) as usize).min(count)
}

// == Eviction Policy ==
/// Runs eviction passes against any [`KvStore`].
///
/// Cheap to clone; clones share the event sink and clock, so the monitor and
/// the write guard can each hold one.
#[derive(Clone)]
pub struct EvictionPolicy {
    classifier: EntryClassifier,
    normal_reclaim_ratio: f64,
    emergency_reclaim_ratio: f64,
    sink: Arc<dyn EventSink>,
}

impl EvictionPolicy {
    // == Constructor ==
    pub fn new(
        classifier: EntryClassifier,
        normal_reclaim_ratio: f64,
        emergency_reclaim_ratio: f64,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            classifier,
            normal_reclaim_ratio,
            emergency_reclaim_ratio,
            sink,
        }
    }

    pub fn from_config(config: &Config, sink: Arc<dyn EventSink>, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            EntryClassifier::from_config(config, clock),
            config.normal_reclaim_ratio,
            config.emergency_reclaim_ratio,
            sink,
        )
    }

    pub fn classifier(&self) -> &EntryClassifier {
        &self.classifier
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    /// Share of normal entries removed in the given mode.
    pub fn ratio(&self, mode: EvictionMode) -> f64 {
        match mode {
            EvictionMode::Normal => self.normal_reclaim_ratio,
            EvictionMode::Emergency => self.emergency_reclaim_ratio,
        }
    }

    // == Run ==
    /// Runs one eviction pass.
    ///
    /// Every oversized and flagged entry is removed, then the oldest normal
    /// entries up to the mode's reclaim ratio. The normal set is fixed by the
    /// snapshot taken before any deletion. Never fails: keys that vanished in
    /// the meantime are skipped and count for nothing.
    pub fn run<S: KvStore + ?Sized>(&self, store: &mut S, mode: EvictionMode) -> EvictionReport {
        let classified = self.classifier.classify_store(store);
        let to_delete = reclaim_count(classified.normal.len(), self.ratio(mode));

        debug!(
            "{} pass: {} oversized, {} flagged, {} of {} normal to remove",
            mode,
            classified.oversized.len(),
            classified.flagged.len(),
            to_delete,
            classified.normal.len()
        );

        let victims = classified
            .oversized
            .iter()
            .chain(classified.flagged.iter())
            .chain(classified.normal.iter().take(to_delete));

        let mut report = EvictionReport::default();
        for entry in victims {
            if let Some(freed) = evict(store, &entry.key) {
                report.deleted_keys.push(entry.key.clone());
                report.bytes_freed += freed;
            }
        }

        self.sink.emit(&GuardEvent::EvictionCompleted {
            mode,
            deleted_count: report.deleted_count(),
            bytes_freed: report.bytes_freed,
        });
        report
    }

    // == Erase All ==
    /// Removes every entry regardless of category.
    pub fn erase_all<S: KvStore + ?Sized>(&self, store: &mut S) -> EvictionReport {
        let mut report = EvictionReport::default();
        for key in store.keys() {
            if let Some(value) = store.get(&key) {
                report.bytes_freed += size_bytes(&key, &value);
                report.deleted_keys.push(key);
            }
        }
        store.clear();

        self.sink.emit(&GuardEvent::RecoveryErasure {
            deleted_count: report.deleted_count(),
            bytes_freed: report.bytes_freed,
        });
        report
    }
}

/// Removes a key, returning its size if it was still present.
fn evict<S: KvStore + ?Sized>(store: &mut S, key: &str) -> Option<u64> {
    let value = store.get(key)?;
    store.remove(key);
    Some(size_bytes(key, &value))
}
