//! Append-only vector storage addressed by global position.
//!
//! The first non-empty append fixes the dimension; later appends must match
//! it. Positions are assigned in arrival order and never reused until the
//! store is cleared.

use crate::types::{Matrix, ShapeError};
use std::ops::Range;

#[derive(Debug, Clone, Default)]
pub struct VectorStore {
    data: Vec<f32>,
    dim: Option<usize>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store whose dimension is already fixed.
    pub fn with_dimension(dim: usize) -> Result<Self, ShapeError> {
        if dim == 0 {
            return Err(ShapeError::ZeroDimension);
        }
        Ok(Self {
            data: Vec::new(),
            dim: Some(dim),
        })
    }

    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.dim
    }

    /// Number of stored vectors.
    #[inline]
    pub fn len(&self) -> usize {
        match self.dim {
            Some(dim) => self.data.len() / dim,
            None => 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fail unless `dim` agrees with the established dimension (if any).
    pub fn check_dimension(&self, dim: usize) -> Result<(), ShapeError> {
        match self.dim {
            Some(expected) if expected != dim => {
                Err(ShapeError::DimensionMismatch { expected, got: dim })
            }
            _ => Ok(()),
        }
    }

    /// Append all rows. Returns the global position of the first one.
    pub fn append(&mut self, rows: &Matrix<f32>) -> Result<usize, ShapeError> {
        self.check_dimension(rows.dim())?;
        let first = self.len();
        if rows.is_empty() {
            return Ok(first);
        }
        self.dim = Some(rows.dim());
        self.data.extend_from_slice(rows.as_slice());
        Ok(first)
    }

    /// The vector at global position `pos`.
    #[inline]
    pub fn get(&self, pos: usize) -> Option<&[f32]> {
        let dim = self.dim?;
        self.data.get(pos * dim..(pos + 1) * dim)
    }

    /// Flat row-major view of positions `range`.
    pub fn range_slice(&self, range: Range<usize>) -> Option<&[f32]> {
        let dim = self.dim?;
        self.data.get(range.start * dim..range.end * dim)
    }

    /// Copy positions `range` out as a matrix.
    pub fn range(&self, range: Range<usize>) -> Option<Matrix<f32>> {
        let dim = self.dim?;
        let rows = range.len();
        let slice = self.range_slice(range)?;
        Matrix::from_vec(slice.to_vec(), rows, dim).ok()
    }

    /// All vectors in global order, row-major.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Keep only the first `len` vectors. The dimension stays fixed.
    pub fn truncate(&mut self, len: usize) {
        if let Some(dim) = self.dim {
            self.data.truncate(len * dim);
        }
    }

    /// Drop every vector and forget the dimension.
    pub fn clear(&mut self) {
        self.data.clear();
        self.data.shrink_to_fit();
        self.dim = None;
    }

    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.data.capacity() * std::mem::size_of::<f32>()
    }
}
