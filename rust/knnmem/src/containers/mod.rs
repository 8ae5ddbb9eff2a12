//! Container types for vector storage.
//!
//! - `VectorStore`: append-only store of every vector ever added

pub mod vector_store;

pub use vector_store::VectorStore;
