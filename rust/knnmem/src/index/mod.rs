//! Nearest-neighbor indices for committed shards and transient batches.
//!
//! - `brute_force`: linear scan, exact
//! - `ball_tree`: metric tree with conservative pruning, exact (default)
//! - `hnsw`: navigable small-world graph, approximate
//!
//! `ShardIndex` wraps whichever variant an `IndexKind` selects so the memory
//! store never names a concrete structure.

pub mod ball_tree;
pub mod brute_force;
pub mod hnsw;
pub mod traits;

pub use ball_tree::{BallTreeIndex, BallTreeParams};
pub use brute_force::{BruteForceIndex, BruteForceParams};
pub use hnsw::{HnswIndex, HnswParams};
pub use traits::{IndexError, IndexType, NearestNeighborIndex};

use crate::types::{IdType, Matrix};

/// Which index a committed shard is built with.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexKind {
    BruteForce(BruteForceParams),
    BallTree(BallTreeParams),
    /// Approximate. A query may return a vector of the shard that is not its
    /// true nearest neighbor.
    Hnsw(HnswParams),
}

impl Default for IndexKind {
    fn default() -> Self {
        IndexKind::BallTree(BallTreeParams::default())
    }
}

impl IndexKind {
    pub fn index_type(&self) -> IndexType {
        match self {
            IndexKind::BruteForce(_) => IndexType::BruteForce,
            IndexKind::BallTree(_) => IndexType::BallTree,
            IndexKind::Hnsw(_) => IndexType::HNSW,
        }
    }

    /// Parameters for the shard with the given ordinal.
    ///
    /// HNSW shards are seeded with `seed + ordinal` so every shard draws its
    /// own level sequence and a rebuild reproduces the same graph.
    pub fn for_shard(&self, ordinal: usize) -> IndexKind {
        match self {
            IndexKind::Hnsw(params) => {
                let mut params = params.clone();
                params.seed = params.seed.wrapping_add(ordinal as u64);
                IndexKind::Hnsw(params)
            }
            other => other.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        match self {
            IndexKind::BruteForce(_) => Ok(()),
            IndexKind::BallTree(params) => params.validate(),
            IndexKind::Hnsw(params) => params.validate(),
        }
    }
}

/// An index of any supported kind.
#[derive(Debug)]
pub enum ShardIndex {
    BruteForce(BruteForceIndex),
    BallTree(BallTreeIndex),
    Hnsw(HnswIndex),
}

impl NearestNeighborIndex for ShardIndex {
    type Params = IndexKind;

    fn build(vectors: Matrix<f32>, params: &IndexKind) -> Result<Self, IndexError> {
        Ok(match params {
            IndexKind::BruteForce(p) => ShardIndex::BruteForce(BruteForceIndex::build(vectors, p)?),
            IndexKind::BallTree(p) => ShardIndex::BallTree(BallTreeIndex::build(vectors, p)?),
            IndexKind::Hnsw(p) => ShardIndex::Hnsw(HnswIndex::build(vectors, p)?),
        })
    }

    fn query_one(&self, query: &[f32]) -> Result<(IdType, f32), IndexError> {
        match self {
            ShardIndex::BruteForce(index) => index.query_one(query),
            ShardIndex::BallTree(index) => index.query_one(query),
            ShardIndex::Hnsw(index) => index.query_one(query),
        }
    }

    fn query(&self, queries: &Matrix<f32>) -> Result<Vec<IdType>, IndexError> {
        match self {
            ShardIndex::BruteForce(index) => index.query(queries),
            ShardIndex::BallTree(index) => index.query(queries),
            ShardIndex::Hnsw(index) => index.query(queries),
        }
    }

    fn len(&self) -> usize {
        match self {
            ShardIndex::BruteForce(index) => index.len(),
            ShardIndex::BallTree(index) => index.len(),
            ShardIndex::Hnsw(index) => index.len(),
        }
    }

    fn dimension(&self) -> usize {
        match self {
            ShardIndex::BruteForce(index) => index.dimension(),
            ShardIndex::BallTree(index) => index.dimension(),
            ShardIndex::Hnsw(index) => index.dimension(),
        }
    }

    fn index_type(&self) -> IndexType {
        match self {
            ShardIndex::BruteForce(_) => IndexType::BruteForce,
            ShardIndex::BallTree(_) => IndexType::BallTree,
            ShardIndex::Hnsw(_) => IndexType::HNSW,
        }
    }

    fn memory_usage(&self) -> usize {
        match self {
            ShardIndex::BruteForce(index) => index.memory_usage(),
            ShardIndex::BallTree(index) => index.memory_usage(),
            ShardIndex::Hnsw(index) => index.memory_usage(),
        }
    }
}
