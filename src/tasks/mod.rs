//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the guard is active.
//!
//! # Tasks
//! - Quota Monitor: checks usage and evicts at the configured interval

mod monitor;

pub use monitor::{spawn_monitor_task, MonitorTask, SharedStore};
