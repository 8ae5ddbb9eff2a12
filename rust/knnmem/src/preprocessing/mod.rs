//! Projection onto the unit hypersphere.
//!
//! Rows with a nonzero L2 norm are divided by it. A row whose norm is exactly
//! zero is replaced by the constant filler `[1/sqrt(D); D]`, which has unit
//! norm and a fixed direction, so all-zero inputs still retrieve
//! deterministically.
//!
//! Stored vectors and queries go through the same function, so a vector
//! queried against itself normalizes to bit-identical components.

use crate::distance::l2_norm;
use crate::types::Matrix;

/// Component value of the zero-row filler for dimension `dim`.
#[inline]
pub fn zero_fill_value(dim: usize) -> f32 {
    (1.0 / (dim as f64).sqrt()) as f32
}

/// Normalize a vector in place.
pub fn normalize_in_place(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm == 0.0 {
        v.fill(zero_fill_value(v.len()));
        return;
    }
    for x in v.iter_mut() {
        *x = (*x as f64 / norm) as f32;
    }
}

/// Return a normalized copy of `v`.
pub fn normalize_vector(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    normalize_in_place(&mut out);
    out
}

/// Normalize every row of a matrix.
pub fn normalize_rows(m: &Matrix<f32>) -> Matrix<f32> {
    let mut out = m.clone();
    normalize_rows_in_place(&mut out);
    out
}

pub fn normalize_rows_in_place(m: &mut Matrix<f32>) {
    for i in 0..m.rows() {
        normalize_in_place(m.row_mut(i));
    }
}
