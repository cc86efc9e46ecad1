//! Quota Guard - demo host
//!
//! Runs the guard over an in-memory store and feeds it writes from stdin.
//! See [`quota_guard::host`] for the input format.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quota_guard::guard::{
    EventSink, FanoutSink, StatsSink, SystemClock, TracingSink, UsageAccountant,
};
use quota_guard::host::{run_input, HostExit};
use quota_guard::tasks::SharedStore;
use quota_guard::{
    spawn_monitor_task, Config, EvictionPolicy, MemoryStore, QuotaMonitor, WriteGuard,
};

/// Main entry point for the quota guard demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Build the guarded store and eviction policy
/// 4. Start the background quota monitor
/// 5. Apply writes read from stdin until EOF or a shutdown signal
/// 6. Run the shutdown flush and report totals, whichever way input ended
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quota_guard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting quota guard");

    let config = Config::from_env();
    config.validate().context("refusing to start")?;
    info!(
        "Configuration loaded: max={}B, emergency={}B, max_entry={}B, interval={}ms",
        config.max_storage_bytes,
        config.emergency_threshold_bytes,
        config.max_entry_bytes,
        config.check_interval_ms
    );

    let stats = Arc::new(StatsSink::new());
    let log_sink: Arc<dyn EventSink> = Arc::new(TracingSink);
    let stats_sink: Arc<dyn EventSink> = stats.clone();
    let sink: Arc<dyn EventSink> = Arc::new(FanoutSink::new(vec![log_sink, stats_sink]));
    let policy = EvictionPolicy::from_config(&config, sink, Arc::new(SystemClock));

    let store: SharedStore<WriteGuard<MemoryStore>> = Arc::new(Mutex::new(WriteGuard::new(
        MemoryStore::new(config.nominal_capacity_bytes),
        policy.clone(),
    )));
    let accountant = UsageAccountant::new(config.nominal_capacity_bytes);

    let monitor = QuotaMonitor::from_config(&config, policy);
    let task = spawn_monitor_task(store.clone(), monitor, config.check_interval());

    let input = BufReader::new(tokio::io::stdin());
    let exit = run_input(input, &store, &accountant, shutdown_signal()).await;

    let report = task.shutdown().await.context("stopping quota monitor")?;
    info!(
        "Shutdown flush removed {} entries; totals: {:?}",
        report.deleted_count(),
        stats.snapshot()
    );

    if let HostExit::InputError(err) = exit {
        return Err(err).context("reading stdin");
    }

    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// Either one is treated as the host unloading.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
