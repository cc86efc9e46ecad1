//! Quota Guard - keeps a size-limited key-value store from overflowing
//!
//! Measures usage, evicts entries by category and age before the limit is
//! hit, and recovers writes the store refuses for capacity.

pub mod config;
pub mod error;
pub mod guard;
pub mod host;
pub mod store;
pub mod tasks;

pub use config::Config;
pub use error::{GuardError, Result};
pub use guard::{EvictionMode, EvictionPolicy, GuardEvent, QuotaMonitor, WriteGuard, Zone};
pub use store::{KvStore, MemoryStore};
pub use tasks::{spawn_monitor_task, MonitorTask};
