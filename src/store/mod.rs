//! Store Module
//!
//! The key-value store port the guard sits in front of, plus an in-memory
//! byte-bounded implementation of it.

mod memory;
mod order;

pub use memory::MemoryStore;
pub use order::KeyOrder;

use crate::error::Result;

// == Store Port ==
/// A blocking, string-keyed, string-valued store with a hard capacity.
///
/// `set` must report a full store as [`GuardError::CapacityExceeded`] so the
/// guard can tell it apart from other failures.
///
/// [`GuardError::CapacityExceeded`]: crate::error::GuardError::CapacityExceeded
pub trait KvStore {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, overwriting any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing an absent key is a no-op.
    fn remove(&mut self, key: &str);

    /// Snapshot of every key currently held, in a stable scan order.
    fn keys(&self) -> Vec<String>;

    /// Removes every entry.
    fn clear(&mut self) {
        for key in self.keys() {
            self.remove(&key);
        }
    }

    fn len(&self) -> usize {
        self.keys().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
