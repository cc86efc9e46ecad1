//! Host Input Loop
//!
//! Feeds line-oriented input into a guarded store until the input ends, a
//! read fails, or the host is told to unload.
//!
//! # Input
//! - `key=value` - write through the guard
//! - `?` - print a usage snapshot as JSON

use std::future::Future;
use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info, warn};

use crate::guard::UsageAccountant;
use crate::store::KvStore;
use crate::tasks::SharedStore;

// == Host Exit ==
/// Why the input loop stopped.
#[derive(Debug)]
pub enum HostExit {
    /// Input reached EOF
    InputClosed,
    /// The shutdown future completed
    Signal,
    /// Reading input failed; the loop stopped without applying the line
    InputError(io::Error),
}

// == Run Input ==
/// Applies input lines to `store` until EOF, a read error, or `shutdown`.
///
/// Never returns early with an error, so the caller can always run its
/// shutdown flush before reporting how the loop ended.
pub async fn run_input<R, S, F>(
    input: R,
    store: &SharedStore<S>,
    accountant: &UsageAccountant,
    shutdown: F,
) -> HostExit
where
    R: AsyncBufRead + Unpin,
    S: KvStore,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut lines = input.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => handle_line(store, accountant, line.trim()).await,
                Ok(None) => {
                    info!("Input closed, shutting down");
                    return HostExit::InputClosed;
                }
                Err(err) => {
                    error!("Failed to read input, shutting down: {}", err);
                    return HostExit::InputError(err);
                }
            },
            _ = &mut shutdown => return HostExit::Signal,
        }
    }
}

/// Applies one line of input to the guarded store.
async fn handle_line<S: KvStore>(
    store: &SharedStore<S>,
    accountant: &UsageAccountant,
    line: &str,
) {
    if line.is_empty() {
        return;
    }

    if line == "?" {
        let snapshot = accountant.snapshot(&*store.lock().await);
        match serde_json::to_string(&snapshot) {
            Ok(json) => println!("{}", json),
            Err(err) => error!("Failed to render usage snapshot: {}", err),
        }
        return;
    }

    let Some((key, value)) = line.split_once('=') else {
        warn!("Ignoring '{}': expected key=value", line);
        return;
    };

    if let Err(err) = store.lock().await.set(key.trim(), value) {
        error!("Write of '{}' rejected: {}", key.trim(), err);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    use crate::store::MemoryStore;

    fn shared() -> SharedStore<MemoryStore> {
        Arc::new(Mutex::new(MemoryStore::new(10_000)))
    }

    #[tokio::test]
    async fn test_lines_are_written_until_eof() {
        let store = shared();
        let input: &[u8] = b"a=1\n\n  b = 2\nnot a write\n?\n";
        let accountant = UsageAccountant::new(10_000);

        let exit = run_input(input, &store, &accountant, std::future::pending()).await;

        assert!(matches!(exit, HostExit::InputClosed));
        let store = store.lock().await;
        assert_eq!(store.get("a").as_deref(), Some("1"));
        assert_eq!(store.get("b").as_deref(), Some(" 2"));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_utf8_stops_loop_with_error() {
        let store = shared();
        let input: &[u8] = b"a_1600000000000=hello\nb=\xff\xfe\nc=never\n";
        let accountant = UsageAccountant::new(10_000);

        let exit = run_input(input, &store, &accountant, std::future::pending()).await;

        match exit {
            HostExit::InputError(err) => assert_eq!(err.kind(), io::ErrorKind::InvalidData),
            other => panic!("expected input error, got {:?}", other),
        }
        let store = store.lock().await;
        assert!(store.get("a_1600000000000").is_some());
        assert!(store.get("c").is_none());
    }

    #[tokio::test]
    async fn test_shutdown_future_ends_loop() {
        let store = shared();
        let (_writer, reader) = tokio::io::duplex(64);

        let exit = run_input(
            tokio::io::BufReader::new(reader),
            &store,
            &UsageAccountant::new(10_000),
            async {},
        )
        .await;

        assert!(matches!(exit, HostExit::Signal));
    }
}
