//! Simulate command implementation.

use kvbridge_testkit::{run_workload, TestCluster, WorkloadConfig};
use std::time::Instant;
use tracing::info;

/// Options for a simulation run.
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Number of nodes.
    pub nodes: usize,
    /// Local writes across all nodes.
    pub writes: usize,
    /// Local deletes across all nodes.
    pub deletes: usize,
    /// Distinct keys.
    pub keys: usize,
    /// Workload seed.
    pub seed: u64,
    /// Pump round limit.
    pub max_rounds: usize,
}

/// Runs the simulate command.
pub fn run(options: &SimulateOptions) -> Result<(), Box<dyn std::error::Error>> {
    if options.nodes < 2 {
        return Err("simulation needs at least 2 nodes".into());
    }

    println!(
        "Simulating {} nodes ({} writes, {} deletes over {} keys, seed {})",
        options.nodes, options.writes, options.deletes, options.keys, options.seed
    );
    println!();

    let mut cluster = TestCluster::new(options.nodes)?;
    let workload = WorkloadConfig {
        writes: options.writes,
        deletes: options.deletes,
        key_space: options.keys,
        seed: options.seed,
        ..WorkloadConfig::default()
    };

    let stats = run_workload(&cluster, &workload)?;
    info!(writes = stats.writes, deletes = stats.deletes, "workload issued");

    let start = Instant::now();
    let pump = cluster.pump_until_quiescent(options.max_rounds)?;
    let elapsed = start.elapsed();

    println!("Replication:");
    println!("  Rounds:    {}", pump.rounds);
    println!("  Delivered: {}", pump.delivered);
    println!("  Duration:  {:?}", elapsed);
    println!();

    println!("Nodes:");
    for node in cluster.nodes() {
        println!(
            "  node {:>3}: {} live keys",
            node.identifier(),
            node.store.len()
        );
    }
    println!();

    if !pump.quiescent {
        println!("✗ Replication did not settle within {} rounds", options.max_rounds);
        return Err("replication did not settle".into());
    }
    if cluster.is_converged() {
        println!("✓ All nodes converged");
        Ok(())
    } else {
        println!("✗ Nodes diverged");
        Err("nodes diverged".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(nodes: usize) -> SimulateOptions {
        SimulateOptions {
            nodes,
            writes: 100,
            deletes: 20,
            keys: 16,
            seed: 3,
            max_rounds: 32,
        }
    }

    #[test]
    fn test_simulation_converges() {
        assert!(run(&options(3)).is_ok());
    }

    #[test]
    fn test_single_node_is_rejected() {
        assert!(run(&options(1)).is_err());
    }
}
