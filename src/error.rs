//! Error types for the quota guard
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Guard Error Enum ==
/// Unified error type for stores and the guard in front of them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// The store refused a write because its byte limit was reached
    #[error("Capacity exceeded writing '{key}': needed {needed} bytes, {available} available")]
    CapacityExceeded {
        key: String,
        needed: u64,
        available: u64,
    },

    /// Any other failure reported by the backing store
    #[error("Store error: {0}")]
    Backend(String),

    /// Eviction and full erasure both failed to make room for the write
    #[error("Write failed permanently for key: {key}")]
    WriteFailedPermanently { key: String },

    /// Configuration rejected at startup
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The background monitor task failed (panicked or was cancelled)
    #[error("Worker error: {0}")]
    Worker(String),
}

impl GuardError {
    // == Capacity Check ==
    /// Returns true only for the capacity-exceeded kind.
    ///
    /// The write guard recovers from this kind and nothing else.
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, GuardError::CapacityExceeded { .. })
    }
}

// == Result Type Alias ==
/// Convenience Result type for the quota guard.
pub type Result<T> = std::result::Result<T, GuardError>;
