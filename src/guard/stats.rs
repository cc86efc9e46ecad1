//! Guard Statistics Module
//!
//! Tallies what the guard has done, built from the events it emits.

use std::sync::Mutex;

use serde::Serialize;

use crate::guard::events::{EventSink, GuardEvent};
use crate::guard::policy::EvictionMode;

/// Converts bytes to mebibytes for display.
pub fn mib(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

// == Guard Stats ==
/// Running totals of guard activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GuardStats {
    /// Completed normal-mode eviction passes
    pub normal_passes: u64,
    /// Completed emergency-mode eviction passes
    pub emergency_passes: u64,
    /// Entries removed by eviction passes and erasures
    pub keys_evicted: u64,
    /// Bytes reclaimed by eviction passes and erasures
    pub bytes_freed: u64,
    /// Full-store erasures performed by the write guard
    pub erasures: u64,
    /// Writes that failed even after erasure
    pub permanent_failures: u64,
    /// Zone changes observed by the monitor
    pub threshold_crossings: u64,
}

impl GuardStats {
    // == Constructor ==
    /// Creates a new GuardStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_passes(&self) -> u64 {
        self.normal_passes + self.emergency_passes
    }

    // == Record Pass ==
    /// Counts one eviction pass and what it removed.
    pub fn record_pass(&mut self, mode: EvictionMode, deleted: usize, bytes: u64) {
        match mode {
            EvictionMode::Normal => self.normal_passes += 1,
            EvictionMode::Emergency => self.emergency_passes += 1,
        }
        self.keys_evicted += deleted as u64;
        self.bytes_freed += bytes;
    }

    // == Record Erasure ==
    pub fn record_erasure(&mut self, deleted: usize, bytes: u64) {
        self.erasures += 1;
        self.keys_evicted += deleted as u64;
        self.bytes_freed += bytes;
    }

    // == Record Event ==
    /// Folds a single event into the totals.
    pub fn record(&mut self, event: &GuardEvent) {
        match event {
            GuardEvent::ThresholdCrossed { .. } => self.threshold_crossings += 1,
            GuardEvent::EvictionCompleted {
                mode,
                deleted_count,
                bytes_freed,
            } => self.record_pass(*mode, *deleted_count, *bytes_freed),
            GuardEvent::RecoveryErasure {
                deleted_count,
                bytes_freed,
            } => self.record_erasure(*deleted_count, *bytes_freed),
            GuardEvent::WriteFailedPermanently { .. } => self.permanent_failures += 1,
        }
    }
}

// == Stats Sink ==
/// Event sink that keeps a running [`GuardStats`].
#[derive(Debug, Default)]
pub struct StatsSink {
    stats: Mutex<GuardStats>,
}

impl StatsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current totals.
    pub fn snapshot(&self) -> GuardStats {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl EventSink for StatsSink {
    fn emit(&self, event: &GuardEvent) {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .record(event);
    }
}
