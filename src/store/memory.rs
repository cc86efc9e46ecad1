//! Memory Store Module
//!
//! In-memory key-value store with a hard byte capacity, accounted the same
//! way the guard measures usage.

use std::collections::HashMap;

use crate::error::{GuardError, Result};
use crate::guard::entry::size_bytes;
use crate::store::{KeyOrder, KvStore};

// == Memory Store ==
/// Byte-bounded storage that rejects writes past its capacity.
#[derive(Debug)]
pub struct MemoryStore {
    /// Key-value storage
    entries: HashMap<String, String>,
    /// Stable scan order
    order: KeyOrder,
    /// Bytes currently held
    used_bytes: u64,
    /// Hard limit in bytes
    capacity_bytes: u64,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty store that holds at most `capacity_bytes`.
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            entries: HashMap::new(),
            order: KeyOrder::new(),
            used_bytes: 0,
            capacity_bytes,
        }
    }

    /// Bytes currently held.
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    /// Bytes still free before the capacity is reached.
    pub fn available_bytes(&self) -> u64 {
        self.capacity_bytes.saturating_sub(self.used_bytes)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    // == Set ==
    /// Stores a key-value pair.
    ///
    /// An overwrite only needs room for the difference between the old and
    /// the new entry.
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let needed = size_bytes(key, value);
        let replaced = self
            .entries
            .get(key)
            .map(|old| size_bytes(key, old))
            .unwrap_or(0);
        let available = self.capacity_bytes - (self.used_bytes - replaced);

        if needed > available {
            return Err(GuardError::CapacityExceeded {
                key: key.to_string(),
                needed,
                available,
            });
        }

        self.entries.insert(key.to_string(), value.to_string());
        self.order.insert(key);
        self.used_bytes = self.used_bytes - replaced + needed;
        Ok(())
    }

    // == Remove ==
    fn remove(&mut self, key: &str) {
        if let Some(old) = self.entries.remove(key) {
            self.order.remove(key);
            self.used_bytes -= size_bytes(key, &old);
        }
    }

    fn keys(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.used_bytes = 0;
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
