//! Guard Events
//!
//! Structured notifications the guard emits for whoever displays them.
//! The guard only calls into a sink; it never depends on how (or whether)
//! events are rendered.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::guard::monitor::Zone;
use crate::guard::policy::EvictionMode;
use crate::guard::stats::mib;

// == Guard Event ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GuardEvent {
    /// Usage moved into a different zone since the previous check
    ThresholdCrossed { zone: Zone },
    /// An eviction pass finished
    EvictionCompleted {
        mode: EvictionMode,
        deleted_count: usize,
        bytes_freed: u64,
    },
    /// The whole store was erased to make room for a write
    RecoveryErasure { deleted_count: usize, bytes_freed: u64 },
    /// A write could not be stored even after erasure
    WriteFailedPermanently { key: String },
}

// == Event Sink ==
/// Receives guard events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &GuardEvent);
}

// == Tracing Sink ==
/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &GuardEvent) {
        match event {
            GuardEvent::ThresholdCrossed { zone: Zone::Ok } => {
                info!("Storage usage back under threshold");
            }
            GuardEvent::ThresholdCrossed { zone } => {
                warn!("Storage usage crossed into zone {}", zone);
            }
            GuardEvent::EvictionCompleted {
                mode,
                deleted_count,
                bytes_freed,
            } => {
                info!(
                    "{} eviction removed {} entries, freed {:.2} MiB",
                    mode,
                    deleted_count,
                    mib(*bytes_freed)
                );
            }
            GuardEvent::RecoveryErasure {
                deleted_count,
                bytes_freed,
            } => {
                warn!(
                    "Store erased to recover from a full write: {} entries, {:.2} MiB",
                    deleted_count,
                    mib(*bytes_freed)
                );
            }
            GuardEvent::WriteFailedPermanently { key } => {
                error!("Unable to write '{}' even after erasing the store", key);
            }
        }
    }
}

// == Channel Sink ==
/// Forwards events to an unbounded channel, e.g. for a UI task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<GuardEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver its events arrive on.
    pub fn new() -> (Self, UnboundedReceiver<GuardEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &GuardEvent) {
        if self.tx.send(event.clone()).is_err() {
            debug!("Event receiver dropped, discarding {:?}", event);
        }
    }
}

// == Fanout Sink ==
/// Delivers each event to every wrapped sink, in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &GuardEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
