//! Small dense linear algebra for the calibration M-step
//!
//! Matrices are flat row-major `d * d` slices.

use crate::types::EPSILON;

/// Cholesky factor L of a symmetric matrix with `ridge` added to the diagonal
///
/// Returns `None` when the ridged matrix is not positive definite.
pub fn cholesky_decompose(a: &[f64], d: usize, ridge: f64) -> Option<Vec<f64>> {
    if a.len() != d * d {
        return None;
    }
    let mut l = vec![0.0; d * d];

    for i in 0..d {
        for j in 0..=i {
            let mut sum = a[i * d + j];
            if i == j {
                sum += ridge;
            }
            for k in 0..j {
                sum -= l[i * d + k] * l[j * d + k];
            }

            if i == j {
                if !sum.is_finite() || sum <= EPSILON {
                    return None;
                }
                l[i * d + i] = sum.sqrt();
            } else {
                l[i * d + j] = sum / l[j * d + j];
            }
        }
    }

    Some(l)
}

/// Solve L Lᵀ x = b given the factor L
pub fn solve_cholesky(l: &[f64], b: &[f64], d: usize) -> Vec<f64> {
    let y = solve_triangular_lower(l, b, d);
    solve_triangular_upper_transpose(l, &y, d)
}

/// Forward substitution for L x = b
pub fn solve_triangular_lower(l: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let mut x = vec![0.0; n];
    for i in 0..n {
        let sum = b[i] - (0..i).map(|j| l[i * n + j] * x[j]).sum::<f64>();
        let diag = l[i * n + i];
        x[i] = if diag.abs() > EPSILON { sum / diag } else { 0.0 };
    }
    x
}

/// Back substitution for Lᵀ x = b
fn solve_triangular_upper_transpose(l: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum = b[i] - ((i + 1)..n).map(|j| l[j * n + i] * x[j]).sum::<f64>();
        let diag = l[i * n + i];
        x[i] = if diag.abs() > EPSILON { sum / diag } else { 0.0 };
    }
    x
}

/// Solve (A + ridge·I) x = b for symmetric positive (semi)definite A
pub fn solve_ridged(a: &[f64], b: &[f64], d: usize, ridge: f64) -> Option<Vec<f64>> {
    if b.len() != d {
        return None;
    }
    let l = cholesky_decompose(a, d, ridge)?;
    let x = solve_cholesky(&l, b, d);
    x.iter().all(|v| v.is_finite()).then_some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cholesky_identity() {
        let l = cholesky_decompose(&[1.0, 0.0, 0.0, 1.0], 2, 0.0).unwrap();
        assert_eq!(l, vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_cholesky_reconstructs_matrix() {
        let a = [4.0, 2.0, 2.0, 3.0];
        let l = cholesky_decompose(&a, 2, 0.0).unwrap();
        for i in 0..2 {
            for j in 0..2 {
                let v: f64 = (0..2).map(|k| l[i * 2 + k] * l[j * 2 + k]).sum();
                assert!((v - a[i * 2 + j]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_solve_matches_known_solution() {
        // [4 2; 2 3] x = [2; 1]  →  x = [0.5, 0]
        let x = solve_ridged(&[4.0, 2.0, 2.0, 3.0], &[2.0, 1.0], 2, 0.0).unwrap();
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
    }

    #[test]
    fn test_ridge_rescues_singular_matrix() {
        let singular = [1.0, 1.0, 1.0, 1.0];
        assert!(cholesky_decompose(&singular, 2, 0.0).is_none());
        let x = solve_ridged(&singular, &[1.0, 1.0], 2, 0.01).unwrap();
        assert!(x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_indefinite_rejected() {
        assert!(solve_ridged(&[-1.0, 0.0, 0.0, 1.0], &[1.0, 1.0], 2, 0.0).is_none());
        assert!(solve_ridged(&[1.0, 0.0, 0.0], &[1.0, 1.0], 2, 0.0).is_none());
    }
}
