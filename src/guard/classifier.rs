//! Entry Classifier Module
//!
//! Sorts store entries into the categories that drive eviction.

use std::sync::Arc;

use serde::Serialize;

use crate::config::Config;
use crate::guard::clock::Clock;
use crate::guard::entry::Entry;
use crate::store::KvStore;

// == Category ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Larger than the per-entry limit; always evicted
    Oversized,
    /// Key matches a flagged substring; always evicted
    Flagged,
    /// Evicted oldest-first, up to the reclaim ratio
    Normal,
}

// == Classified ==
/// Mutually exclusive partitions of one store snapshot.
///
/// `normal` is ordered oldest first; equal timestamps keep scan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classified {
    pub oversized: Vec<Entry>,
    pub flagged: Vec<Entry>,
    pub normal: Vec<Entry>,
}

impl Classified {
    pub fn len(&self) -> usize {
        self.oversized.len() + self.flagged.len() + self.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == Entry Classifier ==
/// Assigns categories and ages to entries. Never touches the store.
///
/// Entries with no discoverable age are stamped with the clock's current
/// time, so with a real clock two runs over the same data can order those
/// entries differently.
#[derive(Clone)]
pub struct EntryClassifier {
    max_entry_bytes: u64,
    /// Already lower-cased
    flagged_key_substrings: Vec<String>,
    clock: Arc<dyn Clock>,
}

impl EntryClassifier {
    // == Constructor ==
    pub fn new<I, T>(max_entry_bytes: u64, flagged_key_substrings: I, clock: Arc<dyn Clock>) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self {
            max_entry_bytes,
            flagged_key_substrings: flagged_key_substrings
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            clock,
        }
    }

    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            config.max_entry_bytes,
            &config.flagged_key_substrings,
            clock,
        )
    }

    // == Snapshot ==
    /// Reads every entry in scan order and resolves its age.
    ///
    /// The clock is read once, so all fallback-stamped entries in one
    /// snapshot share the same time.
    pub fn snapshot<S: KvStore + ?Sized>(&self, store: &S) -> Vec<Entry> {
        let now_ms = self.clock.now_ms();
        store
            .keys()
            .into_iter()
            .filter_map(|key| {
                let value = store.get(&key)?;
                Some(Entry::resolve(key, value, now_ms))
            })
            .collect()
    }

    // == Category ==
    pub fn category(&self, entry: &Entry) -> Category {
        if entry.size_bytes > self.max_entry_bytes {
            Category::Oversized
        } else if self.is_flagged(&entry.key) {
            Category::Flagged
        } else {
            Category::Normal
        }
    }

    /// Case-insensitive substring match against the flagged list.
    pub fn is_flagged(&self, key: &str) -> bool {
        if self.flagged_key_substrings.is_empty() {
            return false;
        }
        let key = key.to_lowercase();
        self.flagged_key_substrings
            .iter()
            .any(|needle| key.contains(needle.as_str()))
    }

    // == Classify ==
    /// Partitions entries; `normal` comes back sorted oldest first.
    pub fn classify(&self, entries: Vec<Entry>) -> Classified {
        let mut classified = Classified::default();

        for entry in entries {
            match self.category(&entry) {
                Category::Oversized => classified.oversized.push(entry),
                Category::Flagged => classified.flagged.push(entry),
                Category::Normal => classified.normal.push(entry),
            }
        }

        // sort_by_key is stable
        classified.normal.sort_by_key(|entry| entry.timestamp_ms);
        classified
    }

    /// Snapshots the store and classifies it in one step.
    pub fn classify_store<S: KvStore + ?Sized>(&self, store: &S) -> Classified {
        self.classify(self.snapshot(store))
    }
}
