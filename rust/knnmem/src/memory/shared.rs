//! Thread-safe handle over a memory store.
//!
//! Lookups take a shared read lock, so any number of them run concurrently;
//! `add` and `reset` take the write lock and see a consistent store. Clones
//! share the same underlying store.

use super::{MemoryError, MemoryStore};
use crate::types::{Matrix, VectorElement};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug)]
pub struct SharedMemory<M: MemoryStore> {
    inner: Arc<RwLock<M>>,
}

impl<M: MemoryStore> Clone for SharedMemory<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: MemoryStore> SharedMemory<M> {
    pub fn new(memory: M) -> Self {
        Self {
            inner: Arc::new(RwLock::new(memory)),
        }
    }

    pub fn add<T: VectorElement>(&self, vectors: &Matrix<T>) -> Result<(), MemoryError> {
        self.inner.write().add(vectors)
    }

    pub fn get<T: VectorElement>(&self, queries: &Matrix<T>) -> Result<Matrix<T>, MemoryError> {
        self.inner.read().get(queries)
    }

    pub fn reset(&self) {
        self.inner.write().reset();
    }

    pub fn save<P: AsRef<Path>>(&self, directory: P) -> Result<(), MemoryError> {
        self.inner.read().save(directory)
    }

    pub fn load<P: AsRef<Path>>(directory: P) -> Result<Self, MemoryError> {
        Ok(Self::new(M::load(directory)?))
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.inner.read().dimension()
    }

    /// Hold the read lock, e.g. to inspect store-specific state.
    pub fn read(&self) -> RwLockReadGuard<'_, M> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, M> {
        self.inner.write()
    }

    /// Unwrap the store if this is the last handle.
    pub fn into_inner(self) -> Result<M, Self> {
        Arc::try_unwrap(self.inner)
            .map(|lock| lock.into_inner())
            .map_err(|inner| Self { inner })
    }
}

impl<M: MemoryStore> MemoryStore for SharedMemory<M> {
    fn add<T: VectorElement>(&mut self, vectors: &Matrix<T>) -> Result<(), MemoryError> {
        SharedMemory::add(self, vectors)
    }

    fn get<T: VectorElement>(&self, queries: &Matrix<T>) -> Result<Matrix<T>, MemoryError> {
        SharedMemory::get(self, queries)
    }

    fn reset(&mut self) {
        SharedMemory::reset(self);
    }

    fn save<P: AsRef<Path>>(&self, directory: P) -> Result<(), MemoryError> {
        SharedMemory::save(self, directory)
    }

    fn load<P: AsRef<Path>>(directory: P) -> Result<Self, MemoryError> {
        SharedMemory::load(directory)
    }

    fn len(&self) -> usize {
        SharedMemory::len(self)
    }

    fn is_empty(&self) -> bool {
        SharedMemory::is_empty(self)
    }

    fn dimension(&self) -> Option<usize> {
        SharedMemory::dimension(self)
    }
}
