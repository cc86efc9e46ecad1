//! Usage Accountant Module
//!
//! Measures how many bytes a store currently holds.

use serde::Serialize;

use crate::guard::entry::size_bytes;
use crate::store::KvStore;

/// Percent of nominal capacity above which usage is reported as critical
const CRITICAL_PERCENT: f64 = 80.0;

/// Percent of nominal capacity above which usage is reported as a warning
const WARNING_PERCENT: f64 = 60.0;

// == Usage Level ==
/// Coarse health bucket for displaying usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageLevel {
    Healthy,
    Warning,
    Critical,
}

impl UsageLevel {
    fn from_percent(percent: f64) -> Self {
        if percent > CRITICAL_PERCENT {
            UsageLevel::Critical
        } else if percent > WARNING_PERCENT {
            UsageLevel::Warning
        } else {
            UsageLevel::Healthy
        }
    }
}

// == Usage Snapshot ==
/// Point-in-time usage figures for a store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub total_bytes: u64,
    pub entry_count: usize,
    /// Usage against nominal capacity, capped at 100
    pub percent_of_capacity: f64,
    pub level: UsageLevel,
}

// == Usage Accountant ==
/// Computes total and per-entry sizes.
#[derive(Debug, Clone, Copy)]
pub struct UsageAccountant {
    nominal_capacity_bytes: u64,
}

impl UsageAccountant {
    pub fn new(nominal_capacity_bytes: u64) -> Self {
        Self {
            nominal_capacity_bytes,
        }
    }

    /// Sums the size of every entry; 0 for an empty store.
    pub fn total_size<S: KvStore + ?Sized>(&self, store: &S) -> u64 {
        store
            .keys()
            .iter()
            .map(|key| self.entry_size(store, key))
            .sum()
    }

    /// Size of a single entry; 0 if the key is absent.
    pub fn entry_size<S: KvStore + ?Sized>(&self, store: &S, key: &str) -> u64 {
        store
            .get(key)
            .map(|value| size_bytes(key, &value))
            .unwrap_or(0)
    }

    // == Snapshot ==
    /// Measures the store and grades the result against nominal capacity.
    pub fn snapshot<S: KvStore + ?Sized>(&self, store: &S) -> UsageSnapshot {
        let keys = store.keys();
        let total_bytes: u64 = keys.iter().map(|key| self.entry_size(store, key)).sum();

        let percent_of_capacity = if self.nominal_capacity_bytes == 0 {
            100.0
        } else {
            (total_bytes as f64 * 100.0 / self.nominal_capacity_bytes as f64).min(100.0)
        };

        UsageSnapshot {
            total_bytes,
            entry_count: keys.len(),
            percent_of_capacity,
            level: UsageLevel::from_percent(percent_of_capacity),
        }
    }
}
