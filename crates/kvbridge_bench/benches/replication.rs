//! Replication path benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kvbridge_bench::utils::{apply_restamped, bound_replicator, generate_entries};
use kvbridge_testkit::{run_workload, TestCluster, WorkloadConfig};

/// Benchmark applying entries received from a peer.
fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");

    for size in [64, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (_store, mut replicator) = bound_replicator();
            let mut entries = generate_entries(256, size, 2);
            let mut round = 0usize;

            b.iter(|| {
                apply_restamped(&mut replicator, black_box(&mut entries), round).unwrap();
                round += 1;
            });
        });
    }

    group.finish();
}

/// Benchmark draining a peer iterator after a batch of applies.
fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain");

    for count in [100, 1000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let (_store, mut replicator) = bound_replicator();
            for entry in generate_entries(count, 256, 2) {
                replicator.apply(&entry).unwrap();
            }
            let mut iterator = replicator.acquire_modification_iterator(3).unwrap();

            b.iter(|| {
                iterator.mark_consumed_from(0).unwrap();
                let mut bytes = 0usize;
                let drained = iterator
                    .drain(usize::MAX, |entry| {
                        bytes += entry.value().map_or(0, <[u8]>::len);
                    })
                    .unwrap();
                black_box((drained, bytes));
            });
        });
    }

    group.finish();
}

/// Benchmark full-mesh convergence of a small cluster.
fn bench_cluster_convergence(c: &mut Criterion) {
    let mut group = c.benchmark_group("cluster_convergence");
    group.sample_size(20);

    for nodes in [3, 5].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(nodes), nodes, |b, &nodes| {
            let config = WorkloadConfig {
                writes: 200,
                deletes: 20,
                ..WorkloadConfig::default()
            };

            b.iter(|| {
                let mut cluster = TestCluster::new(nodes).unwrap();
                run_workload(&cluster, &config).unwrap();
                let stats = cluster.pump_until_quiescent(64).unwrap();
                black_box(stats);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_apply, bench_drain, bench_cluster_convergence);

criterion_main!(benches);
