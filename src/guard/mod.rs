//! Guard Module
//!
//! Usage accounting, entry classification, eviction policy, threshold
//! monitoring and write interception.

pub mod accountant;
pub mod classifier;
pub mod clock;
pub mod entry;
pub mod events;
pub mod monitor;
pub mod policy;
pub mod stats;
pub mod write_guard;


// Re-export public types
pub use accountant::{UsageAccountant, UsageLevel, UsageSnapshot};
pub use classifier::{Category, Classified, EntryClassifier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{Entry, BYTES_PER_CHAR};
pub use events::{ChannelSink, EventSink, FanoutSink, GuardEvent, TracingSink};
pub use monitor::{QuotaMonitor, TickOutcome, Zone};
pub use policy::{EvictionMode, EvictionPolicy, EvictionReport};
pub use stats::{GuardStats, StatsSink};
pub use write_guard::WriteGuard;
