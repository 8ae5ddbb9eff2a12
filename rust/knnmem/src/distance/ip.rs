//! Inner product.

/// Dot product of two equal-length vectors.
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let dim = a.len().min(b.len());

    let mut sum0 = 0.0f32;
    let mut sum1 = 0.0f32;
    let mut sum2 = 0.0f32;
    let mut sum3 = 0.0f32;

    let unroll = dim / 4 * 4;
    let mut i = 0;
    while i < unroll {
        sum0 += a[i] * b[i];
        sum1 += a[i + 1] * b[i + 1];
        sum2 += a[i + 2] * b[i + 2];
        sum3 += a[i + 3] * b[i + 3];
        i += 4;
    }

    while i < dim {
        sum0 += a[i] * b[i];
        i += 1;
    }

    (sum0 + sum1) + (sum2 + sum3)
}

/// Cosine similarity. Zero vectors have similarity 0 with everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let na = super::l2_norm(a);
    let nb = super::l2_norm(b);
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot_product(a, b) as f64 / (na * nb)) as f32
}
