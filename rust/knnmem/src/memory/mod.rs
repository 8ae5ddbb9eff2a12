//! Long-term vector memory.
//!
//! A memory store accumulates every vector it is given and answers
//! cosine-nearest-neighbor lookups against all of them:
//!
//! - `MemoryCollection`: sharded store. Vectors collect in a buffer until a
//!   full shard's worth is available, which is then compiled into an
//!   immutable index. Lookups query every shard plus the buffer and merge the
//!   per-source winners exactly.
//! - `FlatMemory`: unsharded store that scans every vector on each lookup.
//! - `SharedMemory`: lock-protected handle for sharing a store across threads.
//!
//! Both stores snapshot to [`SNAPSHOT_FILE_NAME`] inside a directory.

pub mod buffer;
pub mod collection;
pub mod flat;
pub mod persistence;
pub mod shard;
pub mod shared;

pub use buffer::Buffer;
pub use collection::MemoryCollection;
pub use flat::FlatMemory;
pub use shard::{Shard, ShardSet};
pub use shared::SharedMemory;

use crate::index::brute_force::DEFAULT_PARALLEL_THRESHOLD;
use crate::index::{IndexError, IndexKind};
use crate::serialization::SerializationError;
use crate::types::{IdType, Matrix, ShapeError, VectorElement};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of a snapshot inside its directory.
pub const SNAPSHOT_FILE_NAME: &str = "knn-memory.bin";

/// Path of the snapshot file inside `directory`.
pub fn snapshot_path<P: AsRef<Path>>(directory: P) -> PathBuf {
    directory.as_ref().join(SNAPSHOT_FILE_NAME)
}

/// Errors raised by memory store operations.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl From<io::Error> for MemoryError {
    fn from(e: io::Error) -> Self {
        MemoryError::Serialization(SerializationError::Io(e))
    }
}

/// Configuration for a `MemoryCollection`.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryParams {
    /// Vectors per shard.
    pub capacity: usize,
    /// Index built for each committed shard.
    pub shard_index: IndexKind,
    /// Query batches at least this large are processed in parallel.
    pub parallel_threshold: usize,
}

impl MemoryParams {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            shard_index: IndexKind::default(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    pub fn with_shard_index(mut self, kind: IndexKind) -> Self {
        self.shard_index = kind;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<(), MemoryError> {
        if self.capacity == 0 {
            return Err(MemoryError::InvalidParameter(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if self.capacity > IdType::MAX as usize {
            return Err(MemoryError::InvalidParameter(format!(
                "capacity must be at most {}",
                IdType::MAX
            )));
        }
        if self.parallel_threshold == 0 {
            return Err(MemoryError::InvalidParameter(
                "parallel_threshold must be greater than zero".to_string(),
            ));
        }
        self.shard_index.validate()?;
        Ok(())
    }
}

/// Point-in-time statistics of a memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub num_shards: usize,
    pub buffer_len: usize,
    pub total_vectors: usize,
    /// Approximate heap usage in bytes.
    pub memory_bytes: usize,
}

/// The memory store capability.
///
/// Stores perform no internal locking: `add` and `reset` need `&mut self`,
/// and callers that share a store across threads wrap it in
/// [`SharedMemory`].
pub trait MemoryStore: Sized + Send + Sync {
    /// Append `vectors` (`[N, D]`). The first non-empty batch fixes `D`.
    ///
    /// # Errors
    /// `Shape` if `D` disagrees with the established dimension or a
    /// component is NaN or infinite. The store is left unchanged.
    fn add<T: VectorElement>(&mut self, vectors: &Matrix<T>) -> Result<(), MemoryError>;

    /// For each query row, the stored vector with the highest cosine
    /// similarity, as originally added. Returns `queries` unchanged while the
    /// store is empty.
    ///
    /// # Errors
    /// `Shape` on a dimension mismatch or a NaN or infinite query component.
    fn get<T: VectorElement>(&self, queries: &Matrix<T>) -> Result<Matrix<T>, MemoryError>;

    /// Drop every stored vector and the established dimension.
    fn reset(&mut self);

    /// Write a full snapshot into `directory`, creating it if needed.
    fn save<P: AsRef<Path>>(&self, directory: P) -> Result<(), MemoryError>;

    /// Read a snapshot written by `save` from `directory`.
    fn load<P: AsRef<Path>>(directory: P) -> Result<Self, MemoryError>;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Established vector dimension, if any vector has been added.
    fn dimension(&self) -> Option<usize>;
}
