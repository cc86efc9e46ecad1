//! Clock Module
//!
//! Wall-clock source used when an entry carries no age of its own.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;

/// Source of the current time in Unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

// == System Clock ==
/// Reads the real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

// == Manual Clock ==
/// A clock that only moves when told to.
///
/// Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn at_ms(start_ms: i64) -> Self {
        Self {
            current_ms: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    pub fn set_ms(&self, ms: i64) {
        self.current_ms.store(ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta_ms: i64) {
        self.current_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.current_ms.load(Ordering::SeqCst)
    }
}
