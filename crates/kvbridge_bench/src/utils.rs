//! Benchmark utilities.

use kvbridge_core::{BridgeConfig, BridgeResult, EngineReplicator, ReplicationEntry};
use kvbridge_storage::InMemoryStore;
use rand::Rng;
use std::sync::Arc;

/// Region sizes the copy benchmarks sweep, straddling the word size.
pub const REGION_SIZES: [usize; 6] = [7, 8, 64, 256, 1024, 4096];

/// Generate random bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate put entries with distinct keys and the given payload size.
pub fn generate_entries(count: usize, payload_size: usize, origin: u8) -> Vec<ReplicationEntry> {
    (0..count)
        .map(|i| {
            let key = format!("bench-{i:08}");
            ReplicationEntry::put(key.as_bytes(), &random_data(payload_size), origin, i as i64 + 1)
        })
        .collect()
}

/// Creates a store for node 1 and a replicator bound to it.
pub fn bound_replicator() -> (Arc<InMemoryStore>, EngineReplicator) {
    let store = Arc::new(InMemoryStore::new(1).expect("node 1 is a valid identifier"));
    let replicator = EngineReplicator::bound(store.clone(), BridgeConfig::default());
    (store, replicator)
}

/// Applies the entry for `round`, cycling through `entries`, after stamping
/// it `round + 1`. Every apply then supersedes the stored record instead of
/// hitting the identical-mutation no-op.
pub fn apply_restamped(
    replicator: &mut EngineReplicator,
    entries: &mut [ReplicationEntry],
    round: usize,
) -> BridgeResult<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let entry = &mut entries[round % entries.len()];
    entry.set_timestamp(round as i64 + 1);
    replicator.apply(entry)
}
