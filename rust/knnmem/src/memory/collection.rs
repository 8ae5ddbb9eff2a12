//! Sharded cosine-kNN memory.
//!
//! Invariants, holding between public calls:
//!
//! 1. `len() == num_shards() * capacity() + buffer_len()`
//! 2. `buffer_len() < capacity()`
//! 3. shard `j` holds exactly global positions `[j * capacity, (j + 1) * capacity)`
//! 4. the buffer holds positions `[num_shards * capacity, len)`
//!
//! The buffer is a view over the tail of the vector store, not a copy. A
//! failed `add` leaves the collection as it was before the call.
//!
//! A lookup normalizes the queries, takes the top-1 of every shard and of a
//! transient brute-force index over the buffer, then re-ranks each query's
//! handful of candidates exactly. With exact shard indices this returns the
//! true global cosine-nearest vector; ties go to the lowest global position.

use super::persistence;
use super::{Buffer, MemoryError, MemoryParams, MemoryStats, MemoryStore, Shard, ShardSet};
use crate::containers::VectorStore;
use crate::index::{BruteForceIndex, BruteForceParams, IndexError, NearestNeighborIndex};
use crate::preprocessing::{normalize_rows, normalize_vector};
use crate::types::{Matrix, VectorElement};
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug)]
pub struct MemoryCollection {
    params: MemoryParams,
    store: VectorStore,
    shards: ShardSet,
}

impl MemoryCollection {
    /// Create an empty collection.
    pub fn new(params: MemoryParams) -> Result<Self, MemoryError> {
        params.validate()?;
        Ok(Self {
            params,
            store: VectorStore::new(),
            shards: ShardSet::new(),
        })
    }

    /// Create an empty collection with default index settings.
    pub fn with_capacity(capacity: usize) -> Result<Self, MemoryError> {
        Self::new(MemoryParams::new(capacity))
    }

    /// Rebuild a collection from its full vector history.
    ///
    /// Shards are recompiled from the store; the rest is the buffer.
    /// `num_shards` and `buffer_len` are the counts the caller expects; any
    /// disagreement with the store length is reported as corruption.
    pub(crate) fn restore(
        params: MemoryParams,
        store: VectorStore,
        num_shards: usize,
        buffer_len: usize,
    ) -> Result<Self, MemoryError> {
        params.validate()?;
        let capacity = params.capacity;
        let expected = num_shards
            .checked_mul(capacity)
            .and_then(|n| n.checked_add(buffer_len));
        if buffer_len >= capacity || expected != Some(store.len()) {
            return Err(persistence::corruption(format!(
                "{num_shards} shards of {capacity} plus {buffer_len} buffered do not add up to {} vectors",
                store.len()
            )));
        }

        if store.as_slice().iter().any(|v| !v.is_finite()) {
            return Err(persistence::corruption(
                "stored vectors hold NaN or infinite components".to_string(),
            ));
        }

        let mut collection = Self {
            params,
            store,
            shards: ShardSet::new(),
        };
        collection.commit_full_groups()?;
        Ok(collection)
    }

    pub fn params(&self) -> &MemoryParams {
        &self.params
    }

    /// Vectors per shard.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.params.capacity
    }

    #[inline]
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    #[inline]
    pub fn buffer_len(&self) -> usize {
        self.store.len().saturating_sub(self.committed())
    }

    /// Vectors not yet committed to a shard.
    pub fn buffer(&self) -> Buffer<'_> {
        Buffer::tail(&self.store, self.committed())
    }

    pub fn shards(&self) -> &ShardSet {
        &self.shards
    }

    /// The vector at global position `pos`, as added (converted to f32).
    pub fn vector(&self, pos: usize) -> Option<&[f32]> {
        self.store.get(pos)
    }

    /// Every vector ever added, in global order.
    pub fn vectors(&self) -> &VectorStore {
        &self.store
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            num_shards: self.shards.len(),
            buffer_len: self.buffer_len(),
            total_vectors: self.store.len(),
            memory_bytes: std::mem::size_of::<Self>()
                + self.store.memory_usage()
                + self.shards.memory_usage(),
        }
    }

    fn merge_params(&self) -> BruteForceParams {
        BruteForceParams::new().with_parallel_threshold(self.params.parallel_threshold)
    }

    /// Number of vectors covered by shards.
    #[inline]
    fn committed(&self) -> usize {
        self.shards.len() * self.params.capacity
    }

    /// Compile every full group at the front of the buffer into a shard.
    ///
    /// Each group is copied once out of the store, so a bulk insert costs
    /// time linear in its length.
    fn commit_full_groups(&mut self) -> Result<(), MemoryError> {
        let capacity = self.params.capacity;
        while self.buffer_len() >= capacity {
            let ordinal = self.shards.len();
            let start = self.committed();
            let group = self.store.range(start..start + capacity).ok_or_else(|| {
                IndexError::Internal(format!("shard {ordinal} out of range"))
            })?;
            let shard = Shard::build(ordinal, capacity, group, &self.params.shard_index)?;
            self.shards.push(shard)?;
        }
        Ok(())
    }

    /// Candidate global positions for each query: one per shard, then one
    /// from the buffer if it is non-empty.
    fn candidates(&self, normalized: &Matrix<f32>) -> Result<Vec<Vec<usize>>, MemoryError> {
        let mut sources = self.shards.query_all(normalized)?;

        let buffer = self.buffer();
        if let Some(buffered) = buffer.normalized() {
            debug!(buffered = buffered.rows(), "building transient buffer index");
            let index = BruteForceIndex::build(buffered, &self.merge_params())?;
            let offset = buffer.start();
            sources.push(
                index
                    .query(normalized)?
                    .into_iter()
                    .map(|local| offset + local as usize)
                    .collect(),
            );
        }
        Ok(sources)
    }

    /// Exact 1-NN among `candidates` for one normalized query.
    fn merge(&self, candidates: &[usize], query: &[f32]) -> Result<usize, MemoryError> {
        let mut normalized = Matrix::with_capacity(candidates.len(), query.len())?;
        for &pos in candidates {
            let raw = self.store.get(pos).ok_or_else(|| {
                IndexError::Internal(format!("candidate {pos} missing from the vector store"))
            })?;
            normalized.push_row(&normalize_vector(raw))?;
        }
        let index = BruteForceIndex::build(normalized, &BruteForceParams::default())?;
        let (local, _) = index.query_one(query)?;
        Ok(candidates[local as usize])
    }

    /// Best stored vector for each query row. The store must be non-empty.
    fn retrieve(&self, queries: &Matrix<f32>) -> Result<Matrix<f32>, MemoryError> {
        let normalized = normalize_rows(queries);
        let sources = self.candidates(&normalized)?;

        let pick = |row: usize| -> Result<usize, MemoryError> {
            let candidates: Vec<usize> = sources.iter().map(|hits| hits[row]).collect();
            self.merge(&candidates, normalized.row(row))
        };
        let chosen: Vec<usize> = if queries.rows() >= self.params.parallel_threshold {
            (0..queries.rows()).into_par_iter().map(pick).collect::<Result<_, _>>()?
        } else {
            (0..queries.rows()).map(pick).collect::<Result<_, _>>()?
        };

        let mut out = Matrix::with_capacity(chosen.len(), queries.dim())?;
        for pos in chosen {
            let raw = self.store.get(pos).ok_or_else(|| {
                IndexError::Internal(format!("selected {pos} missing from the vector store"))
            })?;
            out.push_row(raw)?;
        }
        Ok(out)
    }
}

impl MemoryStore for MemoryCollection {
    fn add<T: VectorElement>(&mut self, vectors: &Matrix<T>) -> Result<(), MemoryError> {
        self.store.check_dimension(vectors.dim())?;
        if vectors.is_empty() {
            return Ok(());
        }

        let vectors = vectors.to_f32();
        vectors.check_finite()?;

        let shards_before = self.shards.len();
        let dim_before = self.store.dimension();
        let first = self.store.append(&vectors)?;
        if let Err(e) = self.commit_full_groups() {
            self.shards.truncate(shards_before);
            if dim_before.is_none() {
                self.store.clear();
            } else {
                self.store.truncate(first);
            }
            return Err(e);
        }
        Ok(())
    }

    fn get<T: VectorElement>(&self, queries: &Matrix<T>) -> Result<Matrix<T>, MemoryError> {
        if self.store.is_empty() {
            return Ok(queries.clone());
        }
        if let Some(dim) = self.store.dimension() {
            queries.check_dim(dim)?;
        }
        if queries.is_empty() {
            return Ok(queries.clone());
        }

        debug!(
            queries = queries.rows(),
            shards = self.shards.len(),
            buffered = self.buffer_len(),
            "memory lookup"
        );
        let queries = queries.to_f32();
        queries.check_finite()?;
        let recalled = self.retrieve(&queries)?;
        Ok(Matrix::from_f32(&recalled))
    }

    fn reset(&mut self) {
        info!(
            vectors = self.store.len(),
            shards = self.shards.len(),
            "resetting memory collection"
        );
        self.shards.clear();
        self.store.clear();
    }

    fn save<P: AsRef<Path>>(&self, directory: P) -> Result<(), MemoryError> {
        persistence::save_collection(self, directory.as_ref())
    }

    fn load<P: AsRef<Path>>(directory: P) -> Result<Self, MemoryError> {
        persistence::load_collection(directory.as_ref())
    }

    fn len(&self) -> usize {
        self.store.len()
    }

    fn dimension(&self) -> Option<usize> {
        self.store.dimension()
    }
}
