//! The nearest-neighbor index interface.
//!
//! An index is built once over a fixed batch of unit-normalized vectors and
//! is immutable afterwards. It answers top-1 queries: for each query row the
//! local id (`0..len`) of the build vector with the smallest squared
//! Euclidean distance. Exact variants break ties by the lowest local id.

use crate::types::{IdType, Matrix};
use thiserror::Error;

/// Errors that can occur while building or querying an index.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("Vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Index is empty")]
    EmptyIndex,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Index type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    BruteForce,
    BallTree,
    HNSW,
}

impl IndexType {
    /// Whether queries are guaranteed to return the true nearest neighbor.
    pub fn is_exact(&self) -> bool {
        !matches!(self, IndexType::HNSW)
    }
}

impl std::fmt::Display for IndexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexType::BruteForce => write!(f, "BruteForce"),
            IndexType::BallTree => write!(f, "BallTree"),
            IndexType::HNSW => write!(f, "HNSW"),
        }
    }
}

/// A build-once, query-many top-1 index.
pub trait NearestNeighborIndex: Send + Sync + Sized {
    /// Construction parameters.
    type Params: Clone + Send + Sync;

    /// Build the index over `vectors`. Row `i` gets local id `i`.
    ///
    /// # Errors
    /// - `EmptyIndex` if `vectors` has no rows
    /// - `InvalidParameter` if `params` is unusable or there are more rows
    ///   than `IdType` can address
    fn build(vectors: Matrix<f32>, params: &Self::Params) -> Result<Self, IndexError>;

    /// Nearest build vector to a single query: `(local id, squared distance)`.
    fn query_one(&self, query: &[f32]) -> Result<(IdType, f32), IndexError>;

    /// Nearest build vector for every row of `queries`.
    fn query(&self, queries: &Matrix<f32>) -> Result<Vec<IdType>, IndexError> {
        check_dimension(self.dimension(), queries.dim())?;
        queries
            .iter_rows()
            .map(|q| self.query_one(q).map(|(id, _)| id))
            .collect()
    }

    /// Number of indexed vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dimension(&self) -> usize;

    fn index_type(&self) -> IndexType;

    /// Approximate heap usage in bytes.
    fn memory_usage(&self) -> usize;
}

#[inline]
pub(crate) fn check_dimension(expected: usize, got: usize) -> Result<(), IndexError> {
    if expected != got {
        return Err(IndexError::DimensionMismatch { expected, got });
    }
    Ok(())
}

/// Validate a build batch: non-empty and addressable by `IdType`.
pub(crate) fn check_build_input(vectors: &Matrix<f32>) -> Result<(), IndexError> {
    if vectors.is_empty() {
        return Err(IndexError::EmptyIndex);
    }
    if vectors.rows() > IdType::MAX as usize {
        return Err(IndexError::InvalidParameter(format!(
            "{} vectors exceed the addressable id range",
            vectors.rows()
        )));
    }
    Ok(())
}

/// True if `(distance, id)` sorts strictly before `(best_distance, best_id)`.
#[inline]
pub(crate) fn is_closer(distance: f32, id: IdType, best_distance: f32, best_id: IdType) -> bool {
    distance
        .total_cmp(&best_distance)
        .then_with(|| id.cmp(&best_id))
        .is_lt()
}
