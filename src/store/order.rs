//! Key Order Module
//!
//! Remembers the order in which keys were first inserted so scans are stable.

use std::collections::VecDeque;

// == Key Order ==
/// Tracks first-insertion order of keys.
///
/// Keys are stored in a VecDeque where:
/// - Front = Inserted earliest
/// - Back = Inserted most recently
///
/// Overwriting a key keeps its first position.
#[derive(Debug, Default, Clone)]
pub struct KeyOrder {
    order: VecDeque<String>,
}

impl KeyOrder {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Insert ==
    /// Appends a key unless it is already tracked.
    pub fn insert(&mut self, key: &str) {
        if !self.contains(key) {
            self.order.push_back(key.to_string());
        }
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.order.clear();
    }

    // == Iter ==
    /// Iterates keys from earliest to latest insertion.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // == Contains ==
    /// Checks if a key is being tracked.
    pub fn contains(&self, key: &str) -> bool {
        self.order.iter().any(|k| k == key)
    }
}
