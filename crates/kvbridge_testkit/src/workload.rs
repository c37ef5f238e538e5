//! Seeded random workloads for cluster simulations.

use crate::fixtures::TestCluster;
use kvbridge_storage::StorageResult;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Shape of a random local workload.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Number of local puts.
    pub writes: usize,
    /// Number of local deletes.
    pub deletes: usize,
    /// Number of distinct keys the workload touches.
    pub key_space: usize,
    /// Maximum value length in bytes.
    pub max_value_size: usize,
    /// RNG seed; the same seed produces the same operation sequence.
    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            writes: 200,
            deletes: 40,
            key_space: 64,
            max_value_size: 128,
            seed: 42,
        }
    }
}

/// Counts of operations a workload issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkloadStats {
    /// Local puts issued.
    pub writes: usize,
    /// Local deletes issued.
    pub deletes: usize,
}

/// Returns the key for slot `index` of the key space.
pub fn workload_key(index: usize) -> Vec<u8> {
    format!("key-{index:05}").into_bytes()
}

/// Issues random local puts and deletes against random nodes of `cluster`.
///
/// Puts and deletes are interleaved in random order. No replication happens
/// here; pump the cluster afterwards.
///
/// # Errors
///
/// Returns an error if a store rejects a local write.
pub fn run_workload(cluster: &TestCluster, config: &WorkloadConfig) -> StorageResult<WorkloadStats> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut stats = WorkloadStats::default();
    if cluster.size() == 0 {
        return Ok(stats);
    }
    let key_space = config.key_space.max(1);

    while stats.writes < config.writes || stats.deletes < config.deletes {
        let node = cluster.node(rng.gen_range(0..cluster.size()));
        let key = workload_key(rng.gen_range(0..key_space));

        let remaining_writes = config.writes - stats.writes;
        let remaining_deletes = config.deletes - stats.deletes;
        if rng.gen_range(0..remaining_writes + remaining_deletes) < remaining_writes {
            let len = rng.gen_range(0..=config.max_value_size);
            let value: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            node.store.put_local(&key, &value)?;
            stats.writes += 1;
        } else {
            node.store.remove_local(&key)?;
            stats.deletes += 1;
        }
    }

    Ok(stats)
}
