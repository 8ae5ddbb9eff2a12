//! Benchmarks for memory store operations.
//!
//! Run with: cargo bench --bench memory_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use knnmem::index::{BruteForceParams, HnswParams, IndexKind};
use knnmem::memory::{FlatMemory, MemoryCollection, MemoryParams, MemoryStore};
use knnmem::types::Matrix;

const DIM: usize = 128;
const CAPACITY: usize = 1024;

/// Generate a random `[rows, dim]` batch.
fn generate_matrix(rows: usize, dim: usize) -> Matrix<f32> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let data = (0..rows * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
    Matrix::from_vec(data, rows, dim).unwrap()
}

fn filled_collection(kind: IndexKind, size: usize) -> MemoryCollection {
    let params = MemoryParams::new(CAPACITY).with_shard_index(kind);
    let mut memory = MemoryCollection::new(params).unwrap();
    memory.add(&generate_matrix(size, DIM)).unwrap();
    memory
}

/// Benchmark adding vectors, including shard compilation.
fn bench_collection_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection_add");
    group.sample_size(10);

    for size in [1000, 4096, 10000] {
        let vectors = generate_matrix(size, DIM);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut memory = MemoryCollection::with_capacity(CAPACITY).unwrap();
                memory.add(black_box(&vectors)).unwrap();
                memory
            });
        });
    }

    group.finish();
}

/// Benchmark one bulk add spanning many small shards.
fn bench_collection_add_bulk(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection_add_bulk");
    group.sample_size(10);

    for size in [20_000, 40_000, 80_000] {
        let vectors = generate_matrix(size, 16);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut memory = MemoryCollection::with_capacity(1).unwrap();
                memory.add(black_box(&vectors)).unwrap();
                memory
            });
        });
    }

    group.finish();
}

/// Benchmark lookups against each shard index kind.
fn bench_collection_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection_get");
    let size = 16 * CAPACITY + 100;
    let queries = generate_matrix(256, DIM);
    group.throughput(Throughput::Elements(queries.rows() as u64));

    let kinds = [
        ("brute_force", IndexKind::BruteForce(BruteForceParams::default())),
        ("ball_tree", IndexKind::default()),
        ("hnsw", IndexKind::Hnsw(HnswParams::default())),
    ];
    for (name, kind) in kinds {
        let memory = filled_collection(kind, size);
        group.bench_function(name, |b| {
            b.iter(|| memory.get(black_box(&queries)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark the unsharded scan for comparison.
fn bench_flat_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_get");

    for size in [1000, 10000] {
        let mut memory = FlatMemory::new();
        memory.add(&generate_matrix(size, DIM)).unwrap();
        let queries = generate_matrix(256, DIM);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| memory.get(black_box(&queries)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark snapshot save and load, which rebuilds every shard.
fn bench_collection_persistence(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection_persistence");
    group.sample_size(10);

    let memory = filled_collection(IndexKind::default(), 8 * CAPACITY);
    let dir = tempfile::tempdir().unwrap();

    group.bench_function("save", |b| {
        b.iter(|| memory.save(dir.path()).unwrap());
    });

    memory.save(dir.path()).unwrap();
    group.bench_function("load", |b| {
        b.iter(|| MemoryCollection::load(dir.path()).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_collection_add,
    bench_collection_add_bulk,
    bench_collection_get,
    bench_flat_get,
    bench_collection_persistence,
);

criterion_main!(benches);
