//! Multi-node convergence through the replication bridge.

use kvbridge_testkit::prelude::*;
use proptest::prelude::*;

fn apply_mutations(cluster: &TestCluster, ops: &[Mutation]) {
    for op in ops {
        match op {
            Mutation::Put { node, key, value } => {
                cluster.node(*node).store.put_local(key, value).unwrap();
            }
            Mutation::Delete { node, key } => {
                cluster.node(*node).store.remove_local(key).unwrap();
            }
        }
    }
}

#[test]
fn three_nodes_converge_after_random_workload() {
    let mut cluster = TestCluster::new(3).unwrap();
    let config = WorkloadConfig {
        writes: 300,
        deletes: 60,
        key_space: 40,
        max_value_size: 64,
        seed: 7,
    };

    run_workload(&cluster, &config).unwrap();
    let stats = cluster.pump_until_quiescent(16).unwrap();

    assert!(stats.quiescent);
    assert!(cluster.is_converged());
}

#[test]
fn interleaved_writes_and_pumps_converge() {
    let mut cluster = TestCluster::new(4).unwrap();
    for round in 0..5u64 {
        let config = WorkloadConfig {
            writes: 40,
            deletes: 10,
            key_space: 16,
            max_value_size: 32,
            seed: round,
        };
        run_workload(&cluster, &config).unwrap();
        cluster.pump().unwrap();
    }

    assert!(cluster.pump_until_quiescent(16).unwrap().quiescent);
    assert!(cluster.is_converged());
}

#[test]
fn delete_wins_when_later() {
    let mut cluster = TestCluster::new(3).unwrap();
    cluster.node(0).store.put_local(b"k", b"v").unwrap();
    cluster.pump_until_quiescent(8).unwrap();

    cluster.node(2).store.remove_local(b"k").unwrap();
    cluster.pump_until_quiescent(8).unwrap();

    for node in cluster.nodes() {
        assert!(node.store.get(b"k").is_none());
        assert!(node.store.record(b"k").unwrap().is_deleted());
    }
}

#[test]
fn quiescent_cluster_stays_quiet() {
    let mut cluster = TestCluster::new(3).unwrap();
    cluster.node(0).store.put_local(b"a", b"1").unwrap();
    cluster.node(1).store.put_local(b"b", b"2").unwrap();
    cluster.pump_until_quiescent(8).unwrap();

    assert_eq!(cluster.pump().unwrap(), 0);
}

proptest! {
    #![proptest_config(cluster_proptest_config())]

    #[test]
    fn any_mutation_sequence_converges(ops in mutation_sequence_strategy(3, 1, 40)) {
        let mut cluster = TestCluster::new(3).unwrap();
        apply_mutations(&cluster, &ops);

        let stats = cluster.pump_until_quiescent(32).unwrap();
        prop_assert!(stats.quiescent);
        prop_assert!(cluster.is_converged());
    }

    #[test]
    fn any_value_replicates_intact(value in region_strategy(), origin in 0usize..3) {
        let mut cluster = TestCluster::new(3).unwrap();
        cluster.node(origin).store.put_local(b"blob", &value).unwrap();

        let stats = cluster.pump_until_quiescent(8).unwrap();
        prop_assert!(stats.quiescent);
        for node in cluster.nodes() {
            prop_assert_eq!(node.store.get(b"blob"), Some(value.clone()));
        }
    }
}
