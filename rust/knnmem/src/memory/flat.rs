//! Unsharded memory that scans every stored vector per lookup.
//!
//! Produces the same results as a `MemoryCollection` with exact shard
//! indices, and serves as its reference in tests and benchmarks.

use super::persistence;
use super::{MemoryError, MemoryStore};
use crate::containers::VectorStore;
use crate::index::brute_force::{scan_nearest, DEFAULT_PARALLEL_THRESHOLD};
use crate::index::IndexError;
use crate::preprocessing::{normalize_rows, normalize_vector};
use crate::types::{Matrix, VectorElement, INVALID_ID};
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug)]
pub struct FlatMemory {
    store: VectorStore,
    /// Unit-norm copy of `store`, row for row.
    normalized: Vec<f32>,
    parallel_threshold: usize,
}

impl FlatMemory {
    pub fn new() -> Self {
        Self {
            store: VectorStore::new(),
            normalized: Vec::new(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    pub fn with_parallel_threshold(threshold: usize) -> Result<Self, MemoryError> {
        Self::from_store(VectorStore::new(), threshold)
    }

    /// Wrap an existing vector history.
    pub fn from_store(store: VectorStore, parallel_threshold: usize) -> Result<Self, MemoryError> {
        if parallel_threshold == 0 {
            return Err(MemoryError::InvalidParameter(
                "parallel_threshold must be greater than zero".to_string(),
            ));
        }
        let normalized = match store.dimension() {
            Some(dim) if !store.is_empty() => {
                let raw = Matrix::from_vec(store.as_slice().to_vec(), store.len(), dim)?;
                raw.check_finite()?;
                normalize_rows(&raw).into_vec()
            }
            _ => Vec::new(),
        };
        Ok(Self {
            store,
            normalized,
            parallel_threshold,
        })
    }

    pub fn parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }

    pub fn vectors(&self) -> &VectorStore {
        &self.store
    }

    fn nearest(&self, query: &[f32], dim: usize) -> Result<&[f32], MemoryError> {
        let (id, _) = scan_nearest(&self.normalized, dim, &normalize_vector(query));
        if id == INVALID_ID {
            return Err(IndexError::EmptyIndex.into());
        }
        self.store.get(id as usize).ok_or_else(|| {
            IndexError::Internal(format!("selected {id} missing from the vector store")).into()
        })
    }
}

impl Default for FlatMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore for FlatMemory {
    fn add<T: VectorElement>(&mut self, vectors: &Matrix<T>) -> Result<(), MemoryError> {
        self.store.check_dimension(vectors.dim())?;
        if vectors.is_empty() {
            return Ok(());
        }

        let vectors = vectors.to_f32();
        vectors.check_finite()?;
        self.store.append(&vectors)?;
        self.normalized
            .extend_from_slice(normalize_rows(&vectors).as_slice());
        Ok(())
    }

    fn get<T: VectorElement>(&self, queries: &Matrix<T>) -> Result<Matrix<T>, MemoryError> {
        let Some(dim) = self.store.dimension().filter(|_| !self.store.is_empty()) else {
            return Ok(queries.clone());
        };
        queries.check_dim(dim)?;
        if queries.is_empty() {
            return Ok(queries.clone());
        }

        debug!(queries = queries.rows(), stored = self.store.len(), "flat lookup");
        let queries = queries.to_f32();
        queries.check_finite()?;
        let chosen: Vec<&[f32]> = if queries.rows() >= self.parallel_threshold {
            queries
                .as_slice()
                .par_chunks_exact(dim)
                .map(|q| self.nearest(q, dim))
                .collect::<Result<_, _>>()?
        } else {
            queries
                .iter_rows()
                .map(|q| self.nearest(q, dim))
                .collect::<Result<_, _>>()?
        };

        let mut out = Matrix::with_capacity(chosen.len(), dim)?;
        for row in chosen {
            out.push_row(row)?;
        }
        Ok(Matrix::from_f32(&out))
    }

    fn reset(&mut self) {
        info!(vectors = self.store.len(), "resetting flat memory");
        self.store.clear();
        self.normalized.clear();
    }

    fn save<P: AsRef<Path>>(&self, directory: P) -> Result<(), MemoryError> {
        persistence::save_flat(self, directory.as_ref())
    }

    fn load<P: AsRef<Path>>(directory: P) -> Result<Self, MemoryError> {
        persistence::load_flat(directory.as_ref())
    }

    fn len(&self) -> usize {
        self.store.len()
    }

    fn dimension(&self) -> Option<usize> {
        self.store.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCollection;
    use crate::types::ShapeError;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_matrix(rng: &mut StdRng, n: usize, dim: usize) -> Matrix<f32> {
        let data = (0..n * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
        Matrix::from_vec(data, n, dim).unwrap()
    }

    #[test]
    fn test_cold_start_is_identity() {
        let memory = FlatMemory::new();
        let q = Matrix::from_rows(&[vec![2.0f32, 3.0]]).unwrap();
        assert_eq!(memory.get(&q).unwrap(), q);
    }

    #[test]
    fn test_finds_most_similar_direction() {
        let mut memory = FlatMemory::new();
        memory
            .add(&Matrix::from_rows(&[vec![10.0f32, 0.0], vec![0.0, 0.1], vec![-3.0, -3.0]]).unwrap())
            .unwrap();
        let out = memory
            .get(&Matrix::from_rows(&[vec![0.2f32, 5.0], vec![-1.0, -0.9], vec![1.0, 0.1]]).unwrap())
            .unwrap();
        assert_eq!(out.row(0), &[0.0, 0.1]);
        assert_eq!(out.row(1), &[-3.0, -3.0]);
        assert_eq!(out.row(2), &[10.0, 0.0]);
    }

    #[test]
    fn test_agrees_with_collection() {
        let mut rng = StdRng::seed_from_u64(21);
        let data = random_matrix(&mut rng, 90, 6);
        let queries = random_matrix(&mut rng, 70, 6);

        let mut flat = FlatMemory::with_parallel_threshold(8).unwrap();
        let mut sharded = MemoryCollection::with_capacity(32).unwrap();
        flat.add(&data).unwrap();
        sharded.add(&data).unwrap();

        assert_eq!(flat.get(&queries).unwrap(), sharded.get(&queries).unwrap());
    }

    #[test]
    fn test_from_store_rebuilds_normalized_copy() {
        let mut rng = StdRng::seed_from_u64(5);
        let data = random_matrix(&mut rng, 20, 4);
        let mut store = VectorStore::new();
        store.append(&data).unwrap();

        let restored = FlatMemory::from_store(store, 16).unwrap();
        let mut fresh = FlatMemory::new();
        fresh.add(&data).unwrap();
        assert_eq!(restored.normalized, fresh.normalized);
        assert_eq!(restored.get(&data).unwrap(), data);
    }

    #[test]
    fn test_zero_parallel_threshold_rejected() {
        assert!(matches!(
            FlatMemory::with_parallel_threshold(0),
            Err(MemoryError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut memory = FlatMemory::new();
        let cold = Matrix::from_rows(&[vec![f32::NAN, 1.0]]).unwrap();
        assert_eq!(memory.get(&cold).unwrap().row(0)[1], 1.0);

        let bad = Matrix::from_rows(&[vec![1.0f32, 0.0], vec![f32::INFINITY, 1.0]]).unwrap();
        assert!(matches!(
            memory.add(&bad),
            Err(MemoryError::Shape(ShapeError::NonFinite { row: 1 }))
        ));
        assert!(memory.is_empty());
        assert_eq!(memory.dimension(), None);

        memory
            .add(&Matrix::from_rows(&[vec![1.0f32, 0.0], vec![0.0, 1.0]]).unwrap())
            .unwrap();
        let query = Matrix::from_rows(&[vec![0.0f32, 1.0], vec![f32::NEG_INFINITY, 0.0]]).unwrap();
        assert!(matches!(
            memory.get(&query),
            Err(MemoryError::Shape(ShapeError::NonFinite { row: 1 }))
        ));
        assert_eq!(memory.normalized.len(), 4);
    }

    #[test]
    fn test_reset() {
        let mut memory = FlatMemory::new();
        memory.add(&Matrix::<f32>::zeros(3, 2).unwrap()).unwrap();
        memory.reset();
        assert!(memory.is_empty());
        assert_eq!(memory.dimension(), None);
        memory.add(&Matrix::<f32>::zeros(1, 5).unwrap()).unwrap();
        assert_eq!(memory.dimension(), Some(5));
    }
}
