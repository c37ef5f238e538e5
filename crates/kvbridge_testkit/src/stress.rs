//! Stress tests for the replication bridge.
//!
//! These exercise concurrent apply contexts and concurrent per-peer senders
//! against a single store.

use kvbridge_core::{EngineReplicator, ReplicationEntry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// What a stress run got done.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StressOutcome {
    /// Entries applied or delivered without error.
    pub completed: usize,
    /// Applies, iterator acquisitions or drains that failed.
    pub failed: usize,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl StressOutcome {
    /// Completed entries per second, or 0 for an instantaneous run.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.completed as f64 / secs
        } else {
            0.0
        }
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of entries each thread applies.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Size of each value in bytes.
    pub value_size: usize,
    /// Identifier stamped on applied entries as their origin.
    pub origin: u8,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            value_size: 256,
            origin: 200,
        }
    }
}

/// Applies entries from `config.threads` threads, each on its own clone of
/// `replicator`. Every thread writes its own key range.
pub fn stress_concurrent_apply(replicator: &EngineReplicator, config: &StressConfig) -> StressOutcome {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let mut context = replicator.clone();
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let operations = config.operations;
            let value = vec![t as u8; config.value_size];
            let origin = config.origin;

            thread::spawn(move || {
                for i in 0..operations {
                    let key = format!("t{t}-{i}");
                    let entry = ReplicationEntry::put(key.as_bytes(), &value, origin, i as i64 + 1);
                    match context.apply(&entry) {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressOutcome {
        completed: successful.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
        elapsed: start.elapsed(),
    }
}

/// Drains the iterators for `peers` concurrently, one thread per peer, while
/// `config.threads` writers apply entries. Counts entries delivered.
///
/// Senders keep draining until the writers are done and their iterator is
/// empty.
pub fn stress_concurrent_senders(
    replicator: &EngineReplicator,
    peers: &[u8],
    config: &StressConfig,
) -> StressOutcome {
    let delivered = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let writers_done = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let senders: Vec<_> = peers
        .iter()
        .map(|&peer| {
            let iterator = replicator.acquire_modification_iterator(peer);
            let delivered = Arc::clone(&delivered);
            let failed = Arc::clone(&failed);
            let writers_done = Arc::clone(&writers_done);
            let writers = config.threads;

            thread::spawn(move || {
                let Ok(mut iterator) = iterator else {
                    failed.fetch_add(1, Ordering::Relaxed);
                    return;
                };
                loop {
                    let finished = writers_done.load(Ordering::Acquire) == writers;
                    match iterator.drain(64, |_| {}) {
                        Ok(0) if finished => break,
                        Ok(0) => thread::yield_now(),
                        Ok(n) => {
                            delivered.fetch_add(n, Ordering::Relaxed);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            break;
                        }
                    }
                }
            })
        })
        .collect();

    let writers: Vec<_> = (0..config.threads)
        .map(|t| {
            let mut context = replicator.clone();
            let failed = Arc::clone(&failed);
            let writers_done = Arc::clone(&writers_done);
            let operations = config.operations;
            let value = vec![0x5au8; config.value_size];
            let origin = config.origin;

            thread::spawn(move || {
                for i in 0..operations {
                    let key = format!("w{t}-{i}");
                    let entry = ReplicationEntry::put(key.as_bytes(), &value, origin, i as i64 + 1);
                    if context.apply(&entry).is_err() {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                writers_done.fetch_add(1, Ordering::Release);
            })
        })
        .collect();

    for handle in writers.into_iter().chain(senders) {
        handle.join().expect("Thread panicked");
    }

    StressOutcome {
        completed: delivered.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
        elapsed: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvbridge_core::BridgeConfig;
    use kvbridge_storage::InMemoryStore;

    fn bound() -> (Arc<InMemoryStore>, EngineReplicator) {
        let store = Arc::new(InMemoryStore::new(1).unwrap());
        let replicator = EngineReplicator::bound(store.clone(), BridgeConfig::default());
        (store, replicator)
    }

    #[test]
    fn test_concurrent_apply() {
        let (store, replicator) = bound();
        let config = StressConfig {
            operations: 500,
            threads: 4,
            value_size: 64,
            ..Default::default()
        };

        let result = stress_concurrent_apply(&replicator, &config);
        assert_eq!(result.failed, 0);
        assert_eq!(result.completed, 2_000);
        assert_eq!(store.len(), 2_000);
        assert!(result.throughput() > 0.0);
    }

    #[test]
    fn test_instant_run_has_zero_throughput() {
        let outcome = StressOutcome {
            completed: 10,
            failed: 0,
            elapsed: Duration::ZERO,
        };
        assert_eq!(outcome.throughput(), 0.0);
    }

    #[test]
    fn test_concurrent_senders_see_every_key() {
        let (_store, replicator) = bound();
        let config = StressConfig {
            operations: 250,
            threads: 2,
            value_size: 32,
            ..Default::default()
        };

        let result = stress_concurrent_senders(&replicator, &[2, 3], &config);
        assert_eq!(result.failed, 0);
        // Distinct keys are never coalesced, so each peer sees all of them.
        assert_eq!(result.completed, 2 * 500);
    }
}
