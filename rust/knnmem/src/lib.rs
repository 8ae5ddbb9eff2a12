//! knnmem - Sharded cosine nearest-neighbor memory for memorizing transformers.
//!
//! A memory store remembers every hidden-state vector it is given and, for a
//! batch of query vectors, returns the stored vector with the highest cosine
//! similarity to each query.
//!
//! # Stores
//!
//! - **MemoryCollection**: vectors collect in a buffer; every full group of
//!   `capacity` vectors is compiled into an immutable shard index. A lookup
//!   takes the best candidate from every shard and from the buffer, then
//!   re-ranks the candidates exactly.
//! - **FlatMemory**: scans every stored vector on each lookup.
//! - **SharedMemory**: `RwLock` handle that shares either store across threads.
//!
//! # Shard Indices
//!
//! - **BallTree** (default): exact, with pruning by bounding balls.
//! - **BruteForce**: exact linear scan.
//! - **HNSW**: approximate graph search, deterministic for a fixed seed.
//!
//! Ranking is by squared Euclidean distance between unit-normalized vectors,
//! which orders pairs the same way as cosine similarity.
//!
//! # Data Types
//!
//! `add` and `get` accept `f32`, `f64`, `Float16` and `BFloat16` matrices.
//! Vectors are stored as `f32` and returned in the query's element type.
//!
//! # Example
//!
//! ```rust
//! use knnmem::prelude::*;
//!
//! let mut memory = MemoryCollection::with_capacity(2).unwrap();
//! memory
//!     .add(&Matrix::from_rows(&[[1.0f32, 0.0], [0.0, 1.0], [1.0, 1.0]]).unwrap())
//!     .unwrap();
//! assert_eq!(memory.num_shards(), 1);
//! assert_eq!(memory.buffer_len(), 1);
//!
//! let recalled = memory.get(&Matrix::from_rows(&[[0.1f32, 2.0]]).unwrap()).unwrap();
//! assert_eq!(recalled.row(0), &[0.0, 1.0]);
//! ```

pub mod containers;
pub mod distance;
pub mod index;
pub mod layer;
pub mod memory;
pub mod preprocessing;
pub mod serialization;
pub mod types;
pub mod utils;

/// Prelude module for convenient imports.
///
/// Use `use knnmem::prelude::*;` to import commonly used types.
pub mod prelude {
    // Types
    pub use crate::types::{
        BFloat16, Float16, IdType, Matrix, ShapeError, VectorElement, INVALID_ID,
    };

    // Distance and normalization
    pub use crate::distance::{cosine_similarity, dot_product, l2_norm, l2_squared};
    pub use crate::preprocessing::{normalize_rows, normalize_vector};

    // Indices
    pub use crate::index::{
        BallTreeIndex, BallTreeParams, BruteForceIndex, BruteForceParams, HnswIndex, HnswParams,
        IndexError, IndexKind, IndexType, NearestNeighborIndex, ShardIndex,
    };

    // Memory stores
    pub use crate::memory::{
        FlatMemory, MemoryCollection, MemoryError, MemoryParams, MemoryStats, MemoryStore,
        SharedMemory,
    };

    // Host layer
    pub use crate::layer::{Blend, DecoderLayer, GateBlend, MemorizingLayer};

    // Serialization
    pub use crate::serialization::{SerializationError, SerializationVersion};
}


#[cfg(test)]
mod parallel_stress_tests;
