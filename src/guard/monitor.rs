//! Quota Monitor Module
//!
//! Measures usage against the two thresholds and triggers eviction passes.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::guard::accountant::{UsageAccountant, UsageSnapshot};
use crate::guard::events::GuardEvent;
use crate::guard::policy::{EvictionMode, EvictionPolicy, EvictionReport};
use crate::guard::stats::mib;
use crate::store::KvStore;

// == Zone ==
/// Usage bucket relative to the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    /// usage <= max_storage_bytes
    Ok,
    /// max_storage_bytes < usage <= emergency_threshold_bytes
    OverNormal,
    /// usage > emergency_threshold_bytes
    OverEmergency,
}

impl Zone {
    pub fn classify(usage: u64, max_storage_bytes: u64, emergency_threshold_bytes: u64) -> Self {
        if usage > emergency_threshold_bytes {
            Zone::OverEmergency
        } else if usage > max_storage_bytes {
            Zone::OverNormal
        } else {
            Zone::Ok
        }
    }

    /// The eviction mode this zone calls for, if any.
    pub fn eviction_mode(self) -> Option<EvictionMode> {
        match self {
            Zone::Ok => None,
            Zone::OverNormal => Some(EvictionMode::Normal),
            Zone::OverEmergency => Some(EvictionMode::Emergency),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Ok => write!(f, "ok"),
            Zone::OverNormal => write!(f, "over-normal"),
            Zone::OverEmergency => write!(f, "over-emergency"),
        }
    }
}

// == Tick Outcome ==
/// Result of a single monitor check.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// Usage measured before any eviction
    pub snapshot: UsageSnapshot,
    pub zone: Zone,
    /// Present when the zone triggered a pass
    pub report: Option<EvictionReport>,
}

// == Quota Monitor ==
/// Periodic usage check.
///
/// The eviction decision is made fresh on every tick. The only state kept
/// between ticks is the last zone seen, used to report zone changes.
#[derive(Clone)]
pub struct QuotaMonitor {
    accountant: UsageAccountant,
    policy: EvictionPolicy,
    max_storage_bytes: u64,
    emergency_threshold_bytes: u64,
    last_zone: Zone,
}

impl QuotaMonitor {
    // == Constructor ==
    pub fn new(
        accountant: UsageAccountant,
        policy: EvictionPolicy,
        max_storage_bytes: u64,
        emergency_threshold_bytes: u64,
    ) -> Self {
        Self {
            accountant,
            policy,
            max_storage_bytes,
            emergency_threshold_bytes,
            last_zone: Zone::Ok,
        }
    }

    pub fn from_config(config: &Config, policy: EvictionPolicy) -> Self {
        Self::new(
            UsageAccountant::new(config.nominal_capacity_bytes),
            policy,
            config.max_storage_bytes,
            config.emergency_threshold_bytes,
        )
    }

    pub fn policy(&self) -> &EvictionPolicy {
        &self.policy
    }

    /// Zone observed by the most recent tick.
    pub fn last_zone(&self) -> Zone {
        self.last_zone
    }

    pub fn zone_for(&self, usage: u64) -> Zone {
        Zone::classify(usage, self.max_storage_bytes, self.emergency_threshold_bytes)
    }

    // == Tick ==
    /// Measures usage and runs the pass the zone calls for.
    pub fn tick<S: KvStore + ?Sized>(&mut self, store: &mut S) -> TickOutcome {
        let snapshot = self.accountant.snapshot(store);
        let zone = self.zone_for(snapshot.total_bytes);

        debug!(
            "Current usage: {:.2} MiB / {:.2} MiB ({} entries, zone {})",
            mib(snapshot.total_bytes),
            mib(self.max_storage_bytes),
            snapshot.entry_count,
            zone
        );

        if zone != self.last_zone {
            self.policy
                .sink()
                .emit(&GuardEvent::ThresholdCrossed { zone });
            self.last_zone = zone;
        }

        let report = zone.eviction_mode().map(|mode| {
            warn!(
                "Storage over threshold ({:.2} MiB, zone {}), starting {} eviction",
                mib(snapshot.total_bytes),
                zone,
                mode
            );
            self.policy.run(store, mode)
        });

        TickOutcome {
            snapshot,
            zone,
            report,
        }
    }

    // == Shutdown Flush ==
    /// Runs an emergency pass regardless of usage.
    ///
    /// Called when the host is about to unload.
    pub fn flush_on_shutdown<S: KvStore + ?Sized>(&mut self, store: &mut S) -> EvictionReport {
        info!("Shutdown flush: running emergency eviction");
        self.policy.run(store, EvictionMode::Emergency)
    }
}
