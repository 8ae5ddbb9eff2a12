//! Parallelism stress tests for shared memory stores.
//!
//! These tests hammer a `SharedMemory` from many threads at once and check
//! that every lookup sees a consistent store and that no addition is lost.

use crate::index::{HnswParams, IndexKind};
use crate::memory::{FlatMemory, MemoryCollection, MemoryParams, MemoryStore, SharedMemory};
use crate::types::Matrix;
use rand::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

fn random_matrix(rows: usize, dim: usize, seed: u64) -> Matrix<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..rows * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
    Matrix::from_vec(data, rows, dim).unwrap()
}

// ============================================================================
// Concurrent Lookups
// ============================================================================

#[test]
fn test_concurrent_lookups_agree() {
    let data = random_matrix(1000, 16, 1);
    let mut memory = MemoryCollection::with_capacity(128).unwrap();
    memory.add(&data).unwrap();
    let memory = SharedMemory::new(memory);

    let queries = random_matrix(200, 16, 2);
    let expected = memory.get(&queries).unwrap();

    let num_threads = 8;
    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let memory = memory.clone();
            let queries = queries.clone();
            let expected = expected.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    assert_eq!(memory.get(&queries).unwrap(), expected);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
}

#[test]
fn test_concurrent_self_lookups() {
    let data = random_matrix(800, 8, 3);
    let mut memory = FlatMemory::new();
    memory.add(&data).unwrap();
    let memory = SharedMemory::new(memory);

    let num_threads = 8;
    let rows_per_thread = data.rows() / num_threads;
    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let memory = memory.clone();
            let start = t * rows_per_thread;
            let slice: Vec<Vec<f32>> = (start..start + rows_per_thread)
                .map(|i| data.row(i).to_vec())
                .collect();
            thread::spawn(move || {
                let queries = Matrix::from_rows(&slice).unwrap();
                assert_eq!(memory.get(&queries).unwrap(), queries);
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
}

// ============================================================================
// Concurrent Writers
// ============================================================================

#[test]
fn test_concurrent_adds_preserve_count() {
    let memory = SharedMemory::new(MemoryCollection::with_capacity(50).unwrap());

    let num_threads = 6;
    let adds_per_thread = 40;
    let rows_per_add = 3;

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let memory = memory.clone();
            thread::spawn(move || {
                for i in 0..adds_per_thread {
                    let seed = (t * adds_per_thread + i) as u64;
                    memory.add(&random_matrix(rows_per_add, 5, seed)).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let total = num_threads * adds_per_thread * rows_per_add;
    assert_eq!(memory.len(), total);
    let guard = memory.read();
    assert_eq!(guard.num_shards(), total / 50);
    assert_eq!(guard.buffer_len(), total % 50);
    assert_eq!(
        guard.num_shards() * guard.capacity() + guard.buffer_len(),
        guard.len()
    );
}

#[test]
fn test_readers_and_writers_interleaved() {
    let params = MemoryParams::new(32).with_shard_index(IndexKind::Hnsw(HnswParams::default()));
    let memory = SharedMemory::new(MemoryCollection::new(params).unwrap());
    memory.add(&random_matrix(10, 6, 500)).unwrap();

    let lookups = AtomicUsize::new(0);
    let queries = random_matrix(16, 6, 501);

    thread::scope(|s| {
        for w in 0..2u64 {
            let memory = &memory;
            s.spawn(move || {
                for i in 0..30 {
                    memory.add(&random_matrix(5, 6, 600 + w * 100 + i)).unwrap();
                }
            });
        }
        for _ in 0..4 {
            let memory = &memory;
            let queries = &queries;
            let lookups = &lookups;
            s.spawn(move || {
                for _ in 0..25 {
                    let guard = memory.read();
                    let out = guard.get(queries).unwrap();
                    assert_eq!(out.shape(), queries.shape());
                    assert_eq!(
                        guard.num_shards() * guard.capacity() + guard.buffer_len(),
                        guard.len()
                    );
                    for row in out.iter_rows() {
                        let found = (0..guard.len()).any(|pos| guard.vector(pos) == Some(row));
                        assert!(found, "lookup returned a vector that was never added");
                    }
                    lookups.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    assert_eq!(lookups.load(Ordering::Relaxed), 100);
    assert_eq!(memory.len(), 10 + 2 * 30 * 5);
}

#[test]
fn test_reset_under_contention() {
    let memory = SharedMemory::new(FlatMemory::new());

    thread::scope(|s| {
        for t in 0..4u64 {
            let memory = &memory;
            s.spawn(move || {
                for i in 0..20 {
                    memory.add(&random_matrix(2, 4, t * 1000 + i)).unwrap();
                    if i % 7 == 0 {
                        memory.reset();
                    }
                    let q = random_matrix(1, 4, 9999);
                    let out = memory.get(&q).unwrap();
                    assert_eq!(out.shape(), (1, 4));
                }
            });
        }
    });

    assert_eq!(memory.len() % 2, 0);
    assert!(memory.dimension().is_none() || memory.dimension() == Some(4));
}

#[test]
fn test_parallel_batch_matches_sequential() {
    let data = random_matrix(700, 12, 7);
    let queries = random_matrix(300, 12, 8);

    let mut parallel =
        MemoryCollection::new(MemoryParams::new(100).with_parallel_threshold(1)).unwrap();
    let mut sequential =
        MemoryCollection::new(MemoryParams::new(100).with_parallel_threshold(usize::MAX)).unwrap();
    parallel.add(&data).unwrap();
    sequential.add(&data).unwrap();

    assert_eq!(parallel.get(&queries).unwrap(), sequential.get(&queries).unwrap());
}
