//! Dense row-major batches of vectors.
//!
//! Every public operation of the store takes or returns a `[rows, dim]`
//! matrix. Rank is fixed at two by construction, so the only shape failures
//! left are a zero dimension, a data buffer of the wrong length, ragged rows,
//! a dimension that disagrees with what the store already holds, and rows
//! with NaN or infinite components.

use super::VectorElement;
use std::slice::ChunksExact;
use thiserror::Error;

/// Errors raised when a batch does not have the expected shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("Vector dimension must be greater than zero")]
    ZeroDimension,

    #[error("Data length mismatch: {rows} rows of dimension {dim} need {expected} values, got {got}")]
    DataLength {
        rows: usize,
        dim: usize,
        expected: usize,
        got: usize,
    },

    #[error("Row {row} has dimension {got}, expected {expected}")]
    RaggedRow { row: usize, expected: usize, got: usize },

    #[error("Vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Row {row} has a NaN or infinite component")]
    NonFinite { row: usize },
}

/// A dense `[rows, dim]` matrix stored row-major in one allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T: VectorElement> {
    data: Vec<T>,
    rows: usize,
    dim: usize,
}

impl<T: VectorElement> Matrix<T> {
    /// Create an empty matrix (zero rows) of the given dimension.
    pub fn new(dim: usize) -> Result<Self, ShapeError> {
        if dim == 0 {
            return Err(ShapeError::ZeroDimension);
        }
        Ok(Self {
            data: Vec::new(),
            rows: 0,
            dim,
        })
    }

    /// Create an empty matrix with room for `rows` rows.
    pub fn with_capacity(rows: usize, dim: usize) -> Result<Self, ShapeError> {
        let mut matrix = Self::new(dim)?;
        matrix.data.reserve(rows * dim);
        Ok(matrix)
    }

    /// Create a matrix filled with zeros.
    pub fn zeros(rows: usize, dim: usize) -> Result<Self, ShapeError> {
        if dim == 0 {
            return Err(ShapeError::ZeroDimension);
        }
        Ok(Self {
            data: vec![T::zero(); rows * dim],
            rows,
            dim,
        })
    }

    /// Wrap a flat row-major buffer.
    pub fn from_vec(data: Vec<T>, rows: usize, dim: usize) -> Result<Self, ShapeError> {
        if dim == 0 {
            return Err(ShapeError::ZeroDimension);
        }
        let expected = rows * dim;
        if data.len() != expected {
            return Err(ShapeError::DataLength {
                rows,
                dim,
                expected,
                got: data.len(),
            });
        }
        Ok(Self { data, rows, dim })
    }

    /// Build a matrix from individual rows.
    ///
    /// The dimension is taken from the first row; an empty slice has no
    /// dimension and is rejected.
    pub fn from_rows<R: AsRef<[T]>>(rows: &[R]) -> Result<Self, ShapeError> {
        let dim = rows.first().map_or(0, |r| r.as_ref().len());
        let mut matrix = Self::with_capacity(rows.len(), dim)?;
        for row in rows {
            matrix.push_row(row.as_ref())?;
        }
        Ok(matrix)
    }

    /// Append one row.
    pub fn push_row(&mut self, row: &[T]) -> Result<(), ShapeError> {
        if row.len() != self.dim {
            return Err(ShapeError::RaggedRow {
                row: self.rows,
                expected: self.dim,
                got: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of components per row.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// `(rows, dim)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.dim)
    }

    /// Borrow row `i`.
    ///
    /// # Panics
    /// If `i >= rows()`.
    #[inline]
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [T] {
        &mut self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Iterate over rows in order.
    #[inline]
    pub fn iter_rows(&self) -> ChunksExact<'_, T> {
        self.data.chunks_exact(self.dim)
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Copy out the rows as owned vectors.
    pub fn to_rows(&self) -> Vec<Vec<T>> {
        self.iter_rows().map(|r| r.to_vec()).collect()
    }

    /// Convert every component to `f32`.
    pub fn to_f32(&self) -> Matrix<f32> {
        Matrix {
            data: self.data.iter().map(|&v| v.to_f32()).collect(),
            rows: self.rows,
            dim: self.dim,
        }
    }

    /// Convert an `f32` matrix into this element type.
    pub fn from_f32(matrix: &Matrix<f32>) -> Self {
        Self {
            data: matrix.data.iter().map(|&v| T::from_f32(v)).collect(),
            rows: matrix.rows,
            dim: matrix.dim,
        }
    }

    /// Fail unless this matrix has dimension `expected`.
    pub fn check_dim(&self, expected: usize) -> Result<(), ShapeError> {
        if self.dim != expected {
            return Err(ShapeError::DimensionMismatch {
                expected,
                got: self.dim,
            });
        }
        Ok(())
    }

    /// Fail on the first row with a NaN or infinite component once
    /// converted to `f32`.
    pub fn check_finite(&self) -> Result<(), ShapeError> {
        match self
            .iter_rows()
            .position(|row| row.iter().any(|&v| !v.to_f32().is_finite()))
        {
            Some(row) => Err(ShapeError::NonFinite { row }),
            None => Ok(()),
        }
    }
}
