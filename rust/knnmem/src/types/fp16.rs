//! IEEE half-precision (`f16`) hidden states.

use super::VectorElement;
use std::fmt;

/// Half-precision float, a transparent wrapper over `half::f16`.
///
/// 5 exponent bits and 10 mantissa bits: roughly three significant decimal
/// digits with a maximum of 65504. Values round-trip through `f32` exactly.
#[derive(Copy, Clone, Default, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Float16(half::f16);

impl Float16 {
    pub const ZERO: Self = Self(half::f16::ZERO);
    pub const ONE: Self = Self(half::f16::ONE);

    #[inline(always)]
    pub const fn from_bits(bits: u16) -> Self {
        Self(half::f16::from_bits(bits))
    }

    #[inline(always)]
    pub const fn to_bits(self) -> u16 {
        self.0.to_bits()
    }
}

impl fmt::Debug for Float16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f16({})", self.0.to_f32())
    }
}

impl From<f32> for Float16 {
    #[inline(always)]
    fn from(v: f32) -> Self {
        Self(half::f16::from_f32(v))
    }
}

impl From<Float16> for f32 {
    #[inline(always)]
    fn from(v: Float16) -> Self {
        v.0.to_f32()
    }
}

impl VectorElement for Float16 {
    #[inline(always)]
    fn to_f32(self) -> f32 {
        self.0.to_f32()
    }

    #[inline(always)]
    fn from_f32(v: f32) -> Self {
        Self(half::f16::from_f32(v))
    }

    #[inline(always)]
    fn zero() -> Self {
        Self::ZERO
    }

    fn type_name() -> &'static str {
        "f16"
    }
}
