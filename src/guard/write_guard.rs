//! Write Guard Module
//!
//! A store decorator that recovers from capacity failures on write.

use tracing::{error, info, warn};

use crate::error::{GuardError, Result};
use crate::guard::events::GuardEvent;
use crate::guard::policy::{EvictionMode, EvictionPolicy};
use crate::store::KvStore;

// == Write Guard ==
/// Wraps a store so that a write refused for capacity triggers eviction.
///
/// Recovery is synchronous: the emergency pass and the retry happen inside
/// the same `set` call, so no other write can slip in between.
pub struct WriteGuard<S> {
    inner: S,
    policy: EvictionPolicy,
}

impl<S: KvStore> WriteGuard<S> {
    // == Constructor ==
    pub fn new(inner: S, policy: EvictionPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn policy(&self) -> &EvictionPolicy {
        &self.policy
    }
}

impl<S: KvStore> KvStore for WriteGuard<S> {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    // == Guarded Set ==
    /// Writes through to the inner store.
    ///
    /// On a capacity failure: emergency pass, retry once; on a second
    /// capacity failure: erase the whole store, try a last time. Any other
    /// failure kind is returned untouched.
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match self.inner.set(key, value) {
            Ok(()) => return Ok(()),
            Err(err) if err.is_capacity_exceeded() => {
                warn!("Write of '{}' hit capacity, evicting before retry", key);
            }
            Err(err) => return Err(err),
        }

        self.policy.run(&mut self.inner, EvictionMode::Emergency);

        match self.inner.set(key, value) {
            Ok(()) => {
                info!("Write of '{}' succeeded after eviction", key);
                return Ok(());
            }
            Err(err) if err.is_capacity_exceeded() => {
                warn!("Write of '{}' still over capacity, erasing store", key);
            }
            Err(err) => return Err(err),
        }

        self.policy.erase_all(&mut self.inner);

        match self.inner.set(key, value) {
            Ok(()) => Ok(()),
            Err(err) if err.is_capacity_exceeded() => {
                error!("Write of '{}' failed after erasure: {}", key, err);
                self.policy
                    .sink()
                    .emit(&GuardEvent::WriteFailedPermanently {
                        key: key.to_string(),
                    });
                Err(GuardError::WriteFailedPermanently {
                    key: key.to_string(),
                })
            }
            Err(err) => Err(err),
        }
    }

    fn remove(&mut self, key: &str) {
        self.inner.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    fn clear(&mut self) {
        self.inner.clear();
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::classifier::EntryClassifier;
    use crate::guard::clock::ManualClock;
    use crate::guard::events::ChannelSink;
    use crate::store::MemoryStore;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Memory store whose next `set` calls fail with scripted errors.
    struct ScriptedStore {
        inner: MemoryStore,
        failures: VecDeque<GuardError>,
        set_calls: usize,
    }

    impl ScriptedStore {
        fn new(failures: Vec<GuardError>) -> Self {
            Self {
                inner: MemoryStore::new(1_000_000),
                failures: failures.into(),
                set_calls: 0,
            }
        }
    }

    impl KvStore for ScriptedStore {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            self.set_calls += 1;
            match self.failures.pop_front() {
                Some(err) => Err(err),
                None => self.inner.set(key, value),
            }
        }

        fn remove(&mut self, key: &str) {
            self.inner.remove(key);
        }

        fn keys(&self) -> Vec<String> {
            self.inner.keys()
        }
    }

    fn full(key: &str) -> GuardError {
        GuardError::CapacityExceeded {
            key: key.to_string(),
            needed: 10,
            available: 0,
        }
    }

    fn guard<S: KvStore>(inner: S) -> (WriteGuard<S>, UnboundedReceiver<GuardEvent>) {
        let (sink, rx) = ChannelSink::new();
        let classifier =
            EntryClassifier::new(1_000, ["telemetry"], Arc::new(ManualClock::at_ms(0)));
        let policy = EvictionPolicy::new(classifier, 0.5, 0.5, Arc::new(sink));
        (WriteGuard::new(inner, policy), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<GuardEvent>) -> Vec<GuardEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn seeded(mut store: ScriptedStore) -> ScriptedStore {
        for i in 0..4 {
            store.inner.set(&format!("old_{}", i), "payload").unwrap();
        }
        store
    }

    #[test]
    fn test_successful_write_skips_policy() {
        let (mut guard, mut rx) = guard(seeded(ScriptedStore::new(vec![])));

        guard.set("fresh", "value").unwrap();

        assert_eq!(guard.get("fresh").as_deref(), Some("value"));
        assert_eq!(guard.len(), 5);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_capacity_failure_evicts_once_and_retries() {
        let (mut guard, mut rx) = guard(seeded(ScriptedStore::new(vec![full("fresh")])));

        guard.set("fresh", "value").unwrap();

        assert_eq!(guard.inner().set_calls, 2);
        assert_eq!(guard.get("fresh").as_deref(), Some("value"));
        // half of the four seeded entries went
        assert_eq!(guard.len(), 3);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            GuardEvent::EvictionCompleted {
                mode: EvictionMode::Emergency,
                deleted_count: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_other_failures_propagate_unchanged() {
        let backend = GuardError::Backend("disk unplugged".to_string());
        let (mut guard, mut rx) = guard(seeded(ScriptedStore::new(vec![backend.clone()])));

        assert_eq!(guard.set("fresh", "value"), Err(backend));
        assert_eq!(guard.inner().set_calls, 1);
        assert_eq!(guard.len(), 4);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_second_failure_erases_then_writes() {
        let (mut guard, mut rx) = guard(seeded(ScriptedStore::new(vec![
            full("fresh"),
            full("fresh"),
        ])));

        guard.set("fresh", "value").unwrap();

        assert_eq!(guard.inner().set_calls, 3);
        assert_eq!(guard.keys(), vec!["fresh"]);
        let events = drain(&mut rx);
        assert!(matches!(events[0], GuardEvent::EvictionCompleted { .. }));
        assert_eq!(
            events[1],
            GuardEvent::RecoveryErasure {
                deleted_count: 2,
                bytes_freed: 2 * 24,
            }
        );
    }

    #[test]
    fn test_third_failure_is_permanent() {
        let (mut guard, mut rx) = guard(seeded(ScriptedStore::new(vec![
            full("fresh"),
            full("fresh"),
            full("fresh"),
        ])));

        let result = guard.set("fresh", "value");

        assert_eq!(
            result,
            Err(GuardError::WriteFailedPermanently {
                key: "fresh".to_string()
            })
        );
        assert!(guard.is_empty());
        assert_eq!(
            drain(&mut rx).last(),
            Some(&GuardEvent::WriteFailedPermanently {
                key: "fresh".to_string()
            })
        );
    }

    #[test]
    fn test_backend_failure_on_retry_propagates() {
        let backend = GuardError::Backend("io".to_string());
        let (mut guard, _rx) = guard(seeded(ScriptedStore::new(vec![
            full("fresh"),
            backend.clone(),
        ])));

        assert_eq!(guard.set("fresh", "value"), Err(backend));
        assert_eq!(guard.inner().set_calls, 2);
        // emergency pass ran, erasure did not
        assert_eq!(guard.len(), 2);
    }

    #[test]
    fn test_value_larger_than_capacity_fails_permanently() {
        let (mut guard, _rx) = guard(MemoryStore::new(100));
        guard.set("a", "1").unwrap();

        let result = guard.set("huge", &"x".repeat(200));

        assert!(matches!(
            result,
            Err(GuardError::WriteFailedPermanently { .. })
        ));
        assert!(guard.is_empty());
    }

    #[test]
    fn test_real_store_recovers_by_eviction() {
        // three 34-byte entries fill 102 of 130 bytes
        let (mut guard, _rx) = guard(MemoryStore::new(130));
        for i in 0..3 {
            guard
                .set(&format!("k{}_100000000000{}", i, i), "v")
                .unwrap();
        }

        guard.set("next", "abcdefghijklmn").unwrap();

        assert_eq!(guard.get("next").as_deref(), Some("abcdefghijklmn"));
        // oldest two of three were evicted
        assert!(guard.get("k0_1000000000000").is_none());
        assert!(guard.get("k1_1000000000001").is_none());
        assert!(guard.get("k2_1000000000002").is_some());
    }

    #[test]
    fn test_remove_and_clear_pass_through() {
        let (mut guard, _rx) = guard(MemoryStore::new(1_000));
        guard.set("a", "1").unwrap();
        guard.set("b", "2").unwrap();

        guard.remove("a");
        guard.remove("a");
        assert_eq!(guard.keys(), vec!["b"]);

        guard.clear();
        assert!(guard.inner().is_empty());
    }
}
