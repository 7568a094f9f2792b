use crate::config::{Number, EPSILON};
use wide::f32x8;

/// Dot product of two equal-length dense vectors using 8-lane SIMD.
/// Returns `None` on a length mismatch.
pub fn dot_simd(a: &[Number], b: &[Number]) -> Option<Number> {
    if a.len() != b.len() {
        tracing::trace!("Vector length mismatch: {} vs {}", a.len(), b.len());
        return None;
    }

    let mut acc = f32x8::splat(0.0);
    let len = a.len();
    let simd_len = len - (len % 8);

    for i in (0..simd_len).step_by(8) {
        let va = f32x8::new([
            a[i],
            a[i + 1],
            a[i + 2],
            a[i + 3],
            a[i + 4],
            a[i + 5],
            a[i + 6],
            a[i + 7],
        ]);
        let vb = f32x8::new([
            b[i],
            b[i + 1],
            b[i + 2],
            b[i + 3],
            b[i + 4],
            b[i + 5],
            b[i + 6],
            b[i + 7],
        ]);
        acc += va * vb;
    }

    let mut dot = acc.reduce_add();
    for i in simd_len..len {
        dot += a[i] * b[i];
    }
    Some(dot)
}

pub fn magnitude(vector: &[Number]) -> Number {
    vector.iter().map(|&x| x * x).sum::<Number>().sqrt()
}

/// Scales `vector` to unit length. Near-zero vectors are left untouched.
pub fn normalize_vector(vector: &mut [Number]) {
    let magnitude = magnitude(vector);
    if magnitude > EPSILON {
        for x in vector.iter_mut() {
            *x /= magnitude;
        }
    }
}

/// Removes the component of `vector` along each of the unit vectors in `basis`.
pub fn orthogonalize(vector: &mut [Number], basis: &[Vec<Number>]) {
    for b in basis {
        let proj = dot_simd(vector, b).unwrap_or(0.0);
        for (x, &bx) in vector.iter_mut().zip(b.iter()) {
            *x -= proj * bx;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simd_dot_matches_scalar_dot_on_odd_lengths() {
        let a: Vec<Number> = (0..19).map(|i| i as Number * 0.5).collect();
        let b: Vec<Number> = (0..19).map(|i| 1.0 - i as Number * 0.1).collect();
        let scalar: Number = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        let simd = dot_simd(&a, &b).unwrap();
        assert!((scalar - simd).abs() < 1e-3);
    }

    #[test]
    fn length_mismatch_is_none() {
        assert!(dot_simd(&[1.0, 2.0], &[1.0]).is_none());
    }

    #[test]
    fn normalize_yields_unit_length_and_keeps_zero_vectors() {
        let mut v = vec![3.0, 4.0];
        normalize_vector(&mut v);
        assert!((magnitude(&v) - 1.0).abs() < EPSILON);

        let mut zero = vec![0.0; 4];
        normalize_vector(&mut zero);
        assert_eq!(zero, vec![0.0; 4]);
    }

    #[test]
    fn orthogonalize_removes_basis_component() {
        let basis = vec![vec![1.0, 0.0, 0.0]];
        let mut v = vec![2.0, 3.0, 0.0];
        orthogonalize(&mut v, &basis);
        assert_eq!(v, vec![0.0, 3.0, 0.0]);
    }
}
