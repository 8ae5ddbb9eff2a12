//! Element types accepted by the memory store.
//!
//! Hidden states arrive in whatever precision the host model runs in. The store
//! computes and keeps everything in `f32` and converts back on the way out:
//! - `VectorElement`: conversion to and from the `f32` working precision
//! - `Float16` / `BFloat16`: half-precision wrappers over the `half` crate
//! - `Matrix`: a dense `[rows, dim]` batch of vectors

pub mod bf16;
pub mod fp16;
pub mod matrix;

pub use bf16::BFloat16;
pub use fp16::Float16;
pub use matrix::{Matrix, ShapeError};

use std::fmt::Debug;

/// Row identifier local to a single built index.
pub type IdType = u32;

/// Sentinel for "no row".
pub const INVALID_ID: IdType = IdType::MAX;

/// Trait for types that can be used as vector components.
///
/// All arithmetic happens in `f32`; implementors only need lossless-enough
/// conversion in both directions.
pub trait VectorElement: Copy + Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Convert to the `f32` working precision.
    fn to_f32(self) -> f32;

    /// Convert back from `f32`.
    fn from_f32(v: f32) -> Self;

    /// Zero value.
    fn zero() -> Self;

    /// Short name used in log fields.
    fn type_name() -> &'static str;
}

impl VectorElement for f32 {
    #[inline(always)]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline(always)]
    fn from_f32(v: f32) -> Self {
        v
    }

    #[inline(always)]
    fn zero() -> Self {
        0.0
    }

    fn type_name() -> &'static str {
        "f32"
    }
}

impl VectorElement for f64 {
    #[inline(always)]
    fn to_f32(self) -> f32 {
        self as f32
    }

    #[inline(always)]
    fn from_f32(v: f32) -> Self {
        v as f64
    }

    #[inline(always)]
    fn zero() -> Self {
        0.0
    }

    fn type_name() -> &'static str {
        "f64"
    }
}
