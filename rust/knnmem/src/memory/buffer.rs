//! The un-indexed tail of the vector store.

use crate::containers::VectorStore;
use crate::preprocessing::normalize_rows_in_place;
use crate::types::Matrix;

/// Vectors added since the last shard was committed: positions
/// `[start, store.len())` of the store, in arrival order.
#[derive(Debug, Clone, Copy)]
pub struct Buffer<'a> {
    data: &'a [f32],
    dim: usize,
    start: usize,
}

impl<'a> Buffer<'a> {
    /// View of `store` from position `start` onward. Empty if `start` is at
    /// or past the end.
    pub fn tail(store: &'a VectorStore, start: usize) -> Self {
        let data = store
            .range_slice(start..store.len())
            .unwrap_or_default();
        Self {
            data,
            dim: store.dimension().unwrap_or(0),
            start,
        }
    }

    /// Global position of the first buffered vector.
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat row-major view of the buffered vectors.
    #[inline]
    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    /// Copy of all buffered rows.
    pub fn to_matrix(&self) -> Option<Matrix<f32>> {
        if self.is_empty() {
            return None;
        }
        Matrix::from_vec(self.data.to_vec(), self.len(), self.dim).ok()
    }

    /// All buffered rows, normalized.
    pub fn normalized(&self) -> Option<Matrix<f32>> {
        let mut rows = self.to_matrix()?;
        normalize_rows_in_place(&mut rows);
        Some(rows)
    }
}
