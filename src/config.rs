//! Configuration Module
//!
//! Handles loading and validating guard thresholds from environment variables.

use std::env;
use std::time::Duration;

use crate::error::{GuardError, Result};

const MIB: u64 = 1024 * 1024;

/// Guard configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// Immutable once the guard has been built from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Monitor tick interval in milliseconds
    pub check_interval_ms: u64,
    /// Soft ceiling that triggers a normal eviction pass
    pub max_storage_bytes: u64,
    /// Hard ceiling that triggers an emergency eviction pass
    pub emergency_threshold_bytes: u64,
    /// Any single entry larger than this is always evicted
    pub max_entry_bytes: u64,
    /// Lower-cased key substrings that mark an entry as always evictable
    pub flagged_key_substrings: Vec<String>,
    /// Fraction of normal entries removed by a normal pass
    pub normal_reclaim_ratio: f64,
    /// Fraction of normal entries removed by an emergency pass
    pub emergency_reclaim_ratio: f64,
    /// Capacity the usage percentage is reported against
    pub nominal_capacity_bytes: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `QG_CHECK_INTERVAL_MS` - Monitor interval (default: 60000)
    /// - `QG_MAX_STORAGE_BYTES` - Normal threshold (default: 4 MiB)
    /// - `QG_EMERGENCY_THRESHOLD_BYTES` - Emergency threshold (default: 4.5 MiB)
    /// - `QG_MAX_ENTRY_BYTES` - Oversized entry limit (default: 1 MiB)
    /// - `QG_FLAGGED_KEYS` - Comma-separated flagged key substrings
    /// - `QG_NORMAL_RECLAIM_RATIO` - Normal pass ratio (default: 0.3)
    /// - `QG_EMERGENCY_RECLAIM_RATIO` - Emergency pass ratio (default: 0.6)
    /// - `QG_NOMINAL_CAPACITY_BYTES` - Reported capacity (default: 5 MiB)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let flagged = env::var("QG_FLAGGED_KEYS")
            .ok()
            .map(|raw| raw.split(',').map(str::to_string).collect::<Vec<_>>())
            .unwrap_or(defaults.flagged_key_substrings);

        Self {
            check_interval_ms: parse_var("QG_CHECK_INTERVAL_MS")
                .unwrap_or(defaults.check_interval_ms),
            max_storage_bytes: parse_var("QG_MAX_STORAGE_BYTES")
                .unwrap_or(defaults.max_storage_bytes),
            emergency_threshold_bytes: parse_var("QG_EMERGENCY_THRESHOLD_BYTES")
                .unwrap_or(defaults.emergency_threshold_bytes),
            max_entry_bytes: parse_var("QG_MAX_ENTRY_BYTES").unwrap_or(defaults.max_entry_bytes),
            flagged_key_substrings: normalize_substrings(flagged),
            normal_reclaim_ratio: parse_var("QG_NORMAL_RECLAIM_RATIO")
                .unwrap_or(defaults.normal_reclaim_ratio),
            emergency_reclaim_ratio: parse_var("QG_EMERGENCY_RECLAIM_RATIO")
                .unwrap_or(defaults.emergency_reclaim_ratio),
            nominal_capacity_bytes: parse_var("QG_NOMINAL_CAPACITY_BYTES")
                .unwrap_or(defaults.nominal_capacity_bytes),
        }
    }

    // == Builders ==
    /// Replaces the flagged substrings, lower-casing them and dropping blanks.
    pub fn with_flagged_keys<I, T>(mut self, substrings: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.flagged_key_substrings =
            normalize_substrings(substrings.into_iter().map(Into::into).collect());
        self
    }

    /// Returns the monitor interval as a Duration.
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    // == Validate ==
    /// Rejects threshold combinations the guard cannot act on.
    pub fn validate(&self) -> Result<()> {
        if self.check_interval_ms == 0 {
            return Err(GuardError::InvalidConfig(
                "check_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.emergency_threshold_bytes <= self.max_storage_bytes {
            return Err(GuardError::InvalidConfig(format!(
                "emergency_threshold_bytes ({}) must exceed max_storage_bytes ({})",
                self.emergency_threshold_bytes, self.max_storage_bytes
            )));
        }
        for (name, ratio) in [
            ("normal_reclaim_ratio", self.normal_reclaim_ratio),
            ("emergency_reclaim_ratio", self.emergency_reclaim_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(GuardError::InvalidConfig(format!(
                    "{} must be in (0, 1], got {}",
                    name, ratio
                )));
            }
        }
        if self.nominal_capacity_bytes == 0 {
            return Err(GuardError::InvalidConfig(
                "nominal_capacity_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_interval_ms: 60_000,
            max_storage_bytes: 4 * MIB,
            emergency_threshold_bytes: 4 * MIB + MIB / 2,
            max_entry_bytes: MIB,
            flagged_key_substrings: normalize_substrings(vec![
                "resume_token".to_string(),
                "conversation_history".to_string(),
                "chat_cache".to_string(),
                "telemetry".to_string(),
            ]),
            normal_reclaim_ratio: 0.3,
            emergency_reclaim_ratio: 0.6,
            nominal_capacity_bytes: 5 * MIB,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn normalize_substrings(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
