//! Buffer bridge benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kvbridge_bench::utils::{random_data, REGION_SIZES};
use kvbridge_core::{copy_region, ByteRegion};
use kvbridge_storage::NativeBytes;

/// Benchmark copying a slice into a reused region.
fn bench_slice_to_region(c: &mut Criterion) {
    let mut group = c.benchmark_group("slice_to_region");

    for size in REGION_SIZES.iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let data = random_data(size);
            let mut region = ByteRegion::with_capacity(size);

            b.iter(|| {
                let copied = copy_region(black_box(data.as_slice()), &mut region).unwrap();
                black_box(copied);
            });
        });
    }

    group.finish();
}

/// Benchmark the outgoing direction: native buffer into a canonical region.
fn bench_native_to_region(c: &mut Criterion) {
    let mut group = c.benchmark_group("native_to_region");

    for size in REGION_SIZES.iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let native = NativeBytes::from_vec(random_data(size));
            let mut region = ByteRegion::with_capacity(size);

            b.iter(|| {
                let copied = copy_region(black_box(&native), &mut region).unwrap();
                black_box(copied);
            });
        });
    }

    group.finish();
}

/// Benchmark the apply direction: canonical region into a native buffer.
fn bench_region_to_native(c: &mut Criterion) {
    let mut group = c.benchmark_group("region_to_native");

    for size in REGION_SIZES.iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let region = ByteRegion::from_slice(&random_data(size));
            let mut native = NativeBytes::with_capacity(size);

            b.iter(|| {
                let copied = copy_region(black_box(&region), &mut native).unwrap();
                black_box(copied);
            });
        });
    }

    group.finish();
}

/// Benchmark copying from `Bytes`, as a transport decoder would hand them over.
fn bench_bytes_to_region(c: &mut Criterion) {
    let mut group = c.benchmark_group("bytes_to_region");

    for size in [64, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let data = Bytes::from(random_data(size));
            let mut region = ByteRegion::with_capacity(size);

            b.iter(|| {
                let copied = copy_region(black_box(&data), &mut region).unwrap();
                black_box(copied);
            });
        });
    }

    group.finish();
}

/// Benchmark growth: every copy outgrows the previous allocation.
fn bench_growth(c: &mut Criterion) {
    let data = random_data(4096);

    c.bench_function("growth_from_empty", |b| {
        b.iter(|| {
            let mut region = ByteRegion::default();
            for size in [16, 256, 4096] {
                copy_region(black_box(&data[..size]), &mut region).unwrap();
            }
            black_box(region.capacity());
        });
    });
}

criterion_group!(
    benches,
    bench_slice_to_region,
    bench_native_to_region,
    bench_region_to_native,
    bench_bytes_to_region,
    bench_growth,
);

criterion_main!(benches);
