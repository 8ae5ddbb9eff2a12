//! Decoder-layer adaptor that consults a memory store around an opaque
//! layer computation.
//!
//! For a batch of hidden states `[batch][seq, dim]` the adaptor:
//!
//! 1. recalls, per sample, the nearest stored vector of every position;
//! 2. divides local and recalled rows by their own norm (plus [`NORM_EPS`]);
//! 3. mixes the two with a [`Blend`] and scales each row back by the local
//!    norm;
//! 4. adds the raw hidden states of every sample to the memory;
//! 5. hands the mixed states to the wrapped layer.
//!
//! The memory store stays unaware of norms; rescaling lives here.

use crate::distance::l2_norm;
use crate::memory::{MemoryError, MemoryStore};
use crate::types::{Matrix, ShapeError};

/// Added to row norms before dividing.
pub const NORM_EPS: f32 = 1e-4;

/// Mixes local context with recalled memory. Must preserve shape.
pub trait Blend {
    fn blend(&self, local: &Matrix<f32>, recalled: &Matrix<f32>) -> Result<Matrix<f32>, ShapeError>;
}

/// The wrapped per-layer computation.
pub trait DecoderLayer {
    type Output;

    fn forward(&mut self, hidden: &[Matrix<f32>]) -> Self::Output;
}

/// Fixed convex mix `gate * local + (1 - gate) * recalled`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateBlend {
    gate: f32,
}

impl GateBlend {
    pub fn new(gate: f32) -> Result<Self, MemoryError> {
        if !(0.0..=1.0).contains(&gate) {
            return Err(MemoryError::InvalidParameter(format!(
                "gate must lie in [0, 1], got {gate}"
            )));
        }
        Ok(Self { gate })
    }

    pub fn gate(&self) -> f32 {
        self.gate
    }
}

impl Blend for GateBlend {
    fn blend(&self, local: &Matrix<f32>, recalled: &Matrix<f32>) -> Result<Matrix<f32>, ShapeError> {
        check_same_shape(local, recalled)?;
        let data = local
            .as_slice()
            .iter()
            .zip(recalled.as_slice())
            .map(|(&l, &r)| self.gate * l + (1.0 - self.gate) * r)
            .collect();
        Matrix::from_vec(data, local.rows(), local.dim())
    }
}

fn check_same_shape(expected: &Matrix<f32>, got: &Matrix<f32>) -> Result<(), ShapeError> {
    got.check_dim(expected.dim())?;
    if got.rows() != expected.rows() {
        return Err(ShapeError::DataLength {
            rows: expected.rows(),
            dim: expected.dim(),
            expected: expected.as_slice().len(),
            got: got.as_slice().len(),
        });
    }
    Ok(())
}

/// Divide every row by its norm plus `NORM_EPS`. Returns the divisors.
fn normed(m: &Matrix<f32>) -> (Matrix<f32>, Vec<f32>) {
    let mut out = m.clone();
    let mut scales = Vec::with_capacity(m.rows());
    for i in 0..out.rows() {
        let row = out.row_mut(i);
        let scale = l2_norm(row) as f32 + NORM_EPS;
        row.iter_mut().for_each(|x| *x /= scale);
        scales.push(scale);
    }
    (out, scales)
}

/// A decoder layer with kNN memory attached.
#[derive(Debug)]
pub struct MemorizingLayer<M, B, L> {
    memory: M,
    blend: B,
    inner: L,
}

impl<M, B, L> MemorizingLayer<M, B, L>
where
    M: MemoryStore,
    B: Blend,
    L: DecoderLayer,
{
    pub fn new(memory: M, blend: B, inner: L) -> Self {
        Self {
            memory,
            blend,
            inner,
        }
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn blend(&self) -> &B {
        &self.blend
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut L {
        &mut self.inner
    }

    /// Forget everything remembered, e.g. at a document boundary.
    pub fn reset_memory(&mut self) {
        self.memory.reset();
    }

    pub fn into_parts(self) -> (M, B, L) {
        (self.memory, self.blend, self.inner)
    }

    fn mix(&self, local: &Matrix<f32>) -> Result<Matrix<f32>, MemoryError> {
        let recalled = self.memory.get(local)?;
        let (local_n, scales) = normed(local);
        let (recalled_n, _) = normed(&recalled);

        let mut merged = self.blend.blend(&local_n, &recalled_n)?;
        check_same_shape(local, &merged)?;
        for (i, &scale) in scales.iter().enumerate() {
            merged.row_mut(i).iter_mut().for_each(|x| *x *= scale);
        }
        Ok(merged)
    }
}

impl<M, B, L> DecoderLayer for MemorizingLayer<M, B, L>
where
    M: MemoryStore,
    B: Blend,
    L: DecoderLayer,
{
    type Output = Result<L::Output, MemoryError>;

    fn forward(&mut self, hidden: &[Matrix<f32>]) -> Self::Output {
        let merged = hidden
            .iter()
            .map(|sample| self.mix(sample))
            .collect::<Result<Vec<_>, _>>()?;

        for sample in hidden {
            self.memory.add(sample)?;
        }
        Ok(self.inner.forward(&merged))
    }
}
