//! Squared Euclidean distance and the L2 norm.

/// Squared L2 distance between two equal-length vectors.
///
/// Four independent accumulators, summed in a fixed order, so the result for
/// a given pair never depends on the caller.
#[inline]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let dim = a.len().min(b.len());

    let mut sum0 = 0.0f32;
    let mut sum1 = 0.0f32;
    let mut sum2 = 0.0f32;
    let mut sum3 = 0.0f32;

    let unroll = dim / 4 * 4;
    let mut i = 0;
    while i < unroll {
        let d0 = a[i] - b[i];
        let d1 = a[i + 1] - b[i + 1];
        let d2 = a[i + 2] - b[i + 2];
        let d3 = a[i + 3] - b[i + 3];

        sum0 += d0 * d0;
        sum1 += d1 * d1;
        sum2 += d2 * d2;
        sum3 += d3 * d3;

        i += 4;
    }

    while i < dim {
        let d = a[i] - b[i];
        sum0 += d * d;
        i += 1;
    }

    (sum0 + sum1) + (sum2 + sum3)
}

/// L2 norm, accumulated in f64.
#[inline]
pub fn l2_norm(v: &[f32]) -> f64 {
    v.iter()
        .map(|&x| {
            let x = x as f64;
            x * x
        })
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_squared() {
        let a = [1.0f32, 2.0, 3.0, 4.0, 5.0];
        let b = [0.0f32, 2.0, 1.0, 4.0, 8.0];
        assert_eq!(l2_squared(&a, &b), 1.0 + 0.0 + 4.0 + 0.0 + 9.0);
        assert_eq!(l2_squared(&a, &a), 0.0);
    }

    #[test]
    fn test_l2_squared_symmetric() {
        let a = [0.3f32, -1.7, 2.25, 0.01, 9.5, -3.0, 0.0];
        let b = [1.1f32, 0.4, -2.0, 0.5, 9.0, 3.0, 1.0];
        assert_eq!(l2_squared(&a, &b), l2_squared(&b, &a));
    }

    #[test]
    fn test_l2_norm() {
        assert!((l2_norm(&[3.0, 4.0]) - 5.0).abs() < 1e-12);
        assert_eq!(l2_norm(&[0.0, 0.0, 0.0]), 0.0);
    }
}
