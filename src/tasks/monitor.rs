//! Quota Monitor Task
//!
//! Background task that runs the quota monitor on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::error::{GuardError, Result};
use crate::guard::{EvictionReport, QuotaMonitor};
use crate::store::KvStore;

/// A store shared between the monitor task and host writers.
pub type SharedStore<S> = Arc<Mutex<S>>;

// == Monitor Task ==
/// Handle to a running monitor loop.
///
/// The loop ticks once immediately and then every interval. Each tick holds
/// the store lock for its whole duration, so a tick never interleaves with a
/// write made through the same lock.
pub struct MonitorTask<S> {
    store: SharedStore<S>,
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<QuotaMonitor>,
}

/// Spawns the monitor loop for `store`.
///
/// # Example
/// ```ignore
/// let store = Arc::new(Mutex::new(WriteGuard::new(MemoryStore::new(cap), policy.clone())));
/// let task = spawn_monitor_task(store.clone(), QuotaMonitor::from_config(&config, policy), config.check_interval());
/// // Later, when the host is unloading:
/// task.shutdown().await?;
/// ```
pub fn spawn_monitor_task<S>(
    store: SharedStore<S>,
    monitor: QuotaMonitor,
    interval: Duration,
) -> MonitorTask<S>
where
    S: KvStore + Send + 'static,
{
    let (stop_tx, stop_rx) = oneshot::channel();
    let handle = tokio::spawn(run_loop(store.clone(), monitor, interval, stop_rx));

    MonitorTask {
        store,
        stop_tx,
        handle,
    }
}

async fn run_loop<S>(
    store: SharedStore<S>,
    mut monitor: QuotaMonitor,
    interval: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) -> QuotaMonitor
where
    S: KvStore + Send + 'static,
{
    info!("Starting quota monitor with interval of {:?}", interval);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // The first tick completes immediately
            _ = ticker.tick() => {
                let outcome = {
                    let mut guard = store.lock().await;
                    monitor.tick(&mut *guard)
                };

                match outcome.report {
                    Some(report) => info!(
                        "Quota check: zone {}, removed {} entries",
                        outcome.zone,
                        report.deleted_count()
                    ),
                    None => debug!(
                        "Quota check: zone {}, {} entries, {:.1}% of capacity",
                        outcome.zone,
                        outcome.snapshot.entry_count,
                        outcome.snapshot.percent_of_capacity
                    ),
                }
            }
            _ = &mut stop_rx => {
                debug!("Quota monitor stop requested");
                break;
            }
        }
    }

    monitor
}

impl<S> MonitorTask<S>
where
    S: KvStore + Send + 'static,
{
    /// Stops the loop and runs the shutdown flush.
    ///
    /// The flush is an emergency pass regardless of the current zone.
    pub async fn shutdown(self) -> Result<EvictionReport> {
        // The loop may already have exited; its monitor is still returned
        let _ = self.stop_tx.send(());
        let mut monitor = self
            .handle
            .await
            .map_err(|err| GuardError::Worker(err.to_string()))?;

        let mut guard = self.store.lock().await;
        let report = monitor.flush_on_shutdown(&mut *guard);
        info!(
            "Quota monitor stopped after shutdown flush of {} entries",
            report.deleted_count()
        );
        Ok(report)
    }

    /// Stops the loop without flushing.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
