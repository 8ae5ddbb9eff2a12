//! Exact linear-scan index.
//!
//! Every query is compared against every build vector. Construction is free,
//! which makes this the index for short-lived batches: the live buffer on
//! each `get` and the per-query candidate merge. Batches of at least
//! `parallel_threshold` queries are scanned in parallel with rayon.

use super::traits::{check_build_input, check_dimension, is_closer};
use super::{IndexError, IndexType, NearestNeighborIndex};
use crate::distance::l2_squared;
use crate::types::{IdType, Matrix, INVALID_ID};
use rayon::prelude::*;

/// Query batches at least this large are scanned on the rayon pool.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

/// Parameters for a brute-force index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BruteForceParams {
    /// Minimum number of queries in a batch before the scan goes parallel.
    pub parallel_threshold: usize,
}

impl Default for BruteForceParams {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl BruteForceParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the parallel threshold. `usize::MAX` keeps every scan sequential.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }
}

/// Nearest row of a flat row-major buffer to `query`.
///
/// Rows are visited in order and only a strictly closer row replaces the
/// current best, so ties resolve to the lowest row. Returns
/// `(INVALID_ID, f32::INFINITY)` for an empty buffer.
#[inline]
pub fn scan_nearest(data: &[f32], dim: usize, query: &[f32]) -> (IdType, f32) {
    let mut best = (INVALID_ID, f32::INFINITY);
    for (id, row) in data.chunks_exact(dim).enumerate() {
        let id = id as IdType;
        let dist = l2_squared(row, query);
        if is_closer(dist, id, best.1, best.0) {
            best = (id, dist);
        }
    }
    best
}

/// Exact brute-force index.
#[derive(Debug, Clone)]
pub struct BruteForceIndex {
    vectors: Matrix<f32>,
    params: BruteForceParams,
}

impl BruteForceIndex {
    /// The build vectors.
    pub fn vectors(&self) -> &Matrix<f32> {
        &self.vectors
    }

    pub fn params(&self) -> &BruteForceParams {
        &self.params
    }

    #[inline]
    fn nearest(&self, query: &[f32]) -> (IdType, f32) {
        scan_nearest(self.vectors.as_slice(), self.vectors.dim(), query)
    }
}

impl NearestNeighborIndex for BruteForceIndex {
    type Params = BruteForceParams;

    fn build(vectors: Matrix<f32>, params: &BruteForceParams) -> Result<Self, IndexError> {
        check_build_input(&vectors)?;
        Ok(Self {
            vectors,
            params: params.clone(),
        })
    }

    fn query_one(&self, query: &[f32]) -> Result<(IdType, f32), IndexError> {
        check_dimension(self.vectors.dim(), query.len())?;
        Ok(self.nearest(query))
    }

    fn query(&self, queries: &Matrix<f32>) -> Result<Vec<IdType>, IndexError> {
        check_dimension(self.vectors.dim(), queries.dim())?;

        if queries.rows() >= self.params.parallel_threshold {
            Ok(queries
                .as_slice()
                .par_chunks_exact(queries.dim())
                .map(|q| self.nearest(q).0)
                .collect())
        } else {
            Ok(queries.iter_rows().map(|q| self.nearest(q).0).collect())
        }
    }

    fn len(&self) -> usize {
        self.vectors.rows()
    }

    fn dimension(&self) -> usize {
        self.vectors.dim()
    }

    fn index_type(&self) -> IndexType {
        IndexType::BruteForce
    }

    fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.vectors.as_slice().len() * std::mem::size_of::<f32>()
    }
}
