//! Brain float (`bf16`) hidden states, the usual mixed-precision training dtype.

use super::VectorElement;
use std::fmt;

/// Brain float, a transparent wrapper over `half::bf16`.
///
/// Same exponent range as `f32` with a 7-bit mantissa.
#[derive(Copy, Clone, Default, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct BFloat16(half::bf16);

impl BFloat16 {
    pub const ZERO: Self = Self(half::bf16::ZERO);
    pub const ONE: Self = Self(half::bf16::ONE);

    #[inline(always)]
    pub const fn from_bits(bits: u16) -> Self {
        Self(half::bf16::from_bits(bits))
    }

    #[inline(always)]
    pub const fn to_bits(self) -> u16 {
        self.0.to_bits()
    }
}

impl fmt::Debug for BFloat16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bf16({})", self.0.to_f32())
    }
}

impl From<f32> for BFloat16 {
    #[inline(always)]
    fn from(v: f32) -> Self {
        Self(half::bf16::from_f32(v))
    }
}

impl From<BFloat16> for f32 {
    #[inline(always)]
    fn from(v: BFloat16) -> Self {
        v.0.to_f32()
    }
}

impl VectorElement for BFloat16 {
    #[inline(always)]
    fn to_f32(self) -> f32 {
        self.0.to_f32()
    }

    #[inline(always)]
    fn from_f32(v: f32) -> Self {
        Self(half::bf16::from_f32(v))
    }

    #[inline(always)]
    fn zero() -> Self {
        Self::ZERO
    }

    fn type_name() -> &'static str {
        "bf16"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bfloat16_keeps_f32_range() {
        let big = BFloat16::from_f32(1.0e30);
        assert!(big.to_f32().is_finite());
        assert!((big.to_f32() / 1.0e30 - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_bfloat16_small_integers_exact() {
        for v in [-4.0f32, -1.0, 0.0, 1.0, 2.0, 3.0] {
            assert_eq!(BFloat16::from_f32(v).to_f32(), v);
        }
    }
}
