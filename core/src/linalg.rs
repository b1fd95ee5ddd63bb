//! Linear algebra helpers for the smoothing recursions.
//!
//! Public API:
//!     pub fn symmetrize(m) -> m
//!     pub fn chol_solve_spd(a, b, opt) -> Option<x>
//!     pub fn spd_solve(a, b) -> Option<x>
//!     pub fn block_diagonal(a, b) -> m
//!     pub fn covariance_is_valid(p, tol) -> bool
//!
//! Strategy for solves:
//! 1) Symmetrize A ← 0.5 (A + Aᵀ)
//! 2) Cholesky (A must be positive definite)
//! 3) Reject when the Cholesky factor implies a condition number above the configured bound
//! 4) Solve and reject any non-finite result
//!
//! Every inverse that the filter and smoother need is of a covariance matrix, so the solves never
//! fall back to a general LU decomposition: a covariance that is not positive definite means the
//! model is degenerate and the caller must be told.

use nalgebra::{Cholesky, Matrix2, Matrix4, SMatrix, SymmetricEigen};

/// Symmetrize a matrix: P ← 0.5 (P + Pᵀ)
///
/// Reduces the round-off asymmetry that accumulates in covariance propagation.
#[inline]
pub fn symmetrize<const N: usize>(m: &SMatrix<f64, N, N>) -> SMatrix<f64, N, N> {
    (m + m.transpose()) * 0.5
}

#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    /// Largest accepted 2-norm condition number estimate of A
    pub max_condition: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_condition: 1e14,
        }
    }
}

/// Solve A X = B for symmetric positive definite A via Cholesky.
///
/// The condition number is estimated from the Cholesky factor as
/// (max Lᵢᵢ / min Lᵢᵢ)², a lower bound on the true value that is cheap and catches the
/// near-singular covariances a degenerate model produces.
///
/// Returns None if A is not finite, not positive definite, too badly conditioned, or if the
/// solution contains non-finite values.
pub fn chol_solve_spd<const N: usize, const M: usize>(
    a: &SMatrix<f64, N, N>,
    b: &SMatrix<f64, N, M>,
    opt: SolveOptions,
) -> Option<SMatrix<f64, N, M>> {
    if !a.iter().all(|v| v.is_finite()) || !b.iter().all(|v| v.is_finite()) {
        return None;
    }
    let a_sym = symmetrize(a);
    let ch = Cholesky::new(a_sym)?;

    let l = ch.l();
    let mut l_max = 0.0_f64;
    let mut l_min = f64::INFINITY;
    for i in 0..N {
        let d = l[(i, i)];
        if !(d.is_finite() && d > 0.0) {
            return None;
        }
        l_max = l_max.max(d);
        l_min = l_min.min(d);
    }
    let ratio = l_max / l_min;
    if ratio * ratio > opt.max_condition {
        return None;
    }

    let x = ch.solve(b);
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

/// SPD solve with the default conditioning bound.
pub fn spd_solve<const N: usize, const M: usize>(
    a: &SMatrix<f64, N, N>,
    b: &SMatrix<f64, N, M>,
) -> Option<SMatrix<f64, N, M>> {
    chol_solve_spd(a, b, SolveOptions::default())
}

/// Assemble the 4×4 block-diagonal matrix diag(a, b) from two 2×2 blocks.
pub fn block_diagonal(a: &Matrix2<f64>, b: &Matrix2<f64>) -> Matrix4<f64> {
    let mut m = Matrix4::zeros();
    m.fixed_view_mut::<2, 2>(0, 0).copy_from(a);
    m.fixed_view_mut::<2, 2>(2, 2).copy_from(b);
    m
}

/// Check that a state covariance is finite, symmetric and positive semi-definite.
///
/// Both the asymmetry and the most negative eigenvalue are measured relative to the largest
/// absolute entry, since covariances expressed in degrees routinely sit around 1e-12.
pub fn covariance_is_valid(p: &Matrix4<f64>, tol: f64) -> bool {
    if !p.iter().all(|v| v.is_finite()) {
        return false;
    }
    let scale = p.amax();
    if scale == 0.0 {
        return true;
    }
    if (p - p.transpose()).amax() > tol * scale {
        return false;
    }
    let eigen = SymmetricEigen::new(symmetrize(p));
    eigen.eigenvalues.iter().all(|&l| l >= -tol * scale)
}

/* =============================== Tests ==================================== */

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use nalgebra::{Matrix2x4, Matrix4x2};

    fn approx_eq<const R: usize, const C: usize>(
        a: &SMatrix<f64, R, C>,
        b: &SMatrix<f64, R, C>,
        tol: f64,
    ) -> bool {
        (a - b).amax() <= tol
    }

    #[test]
    fn t_symmetrize() {
        let m = Matrix2::new(1.0, 2.0, 0.0, 3.0);
        let s = symmetrize(&m);
        let s_expected = Matrix2::new(1.0, 1.0, 1.0, 3.0);
        assert!(approx_eq(&s, &s_expected, 1e-15));
    }

    #[test]
    fn t_chol_solve_spd() {
        // A = L Lᵀ is SPD
        let l = Matrix4::new(
            2.0, 0.0, 0.0, 0.0, //
            0.5, 1.0, 0.0, 0.0, //
            0.1, -0.3, 1.5, 0.0, //
            0.0, 0.2, 0.4, 0.8,
        );
        let a = l * l.transpose();
        let x_true = Matrix4x2::new(1.0, -1.0, 2.0, 0.5, -3.0, 0.0, 0.25, 4.0);
        let b = a * x_true;
        let x = spd_solve(&a, &b).expect("Cholesky solve should succeed for SPD");
        assert!(approx_eq(&x, &x_true, 1e-12));
    }

    #[test]
    fn t_chol_solve_tiny_scale() {
        // Covariances in squared degrees are tiny but perfectly well conditioned
        let a = Matrix2::new(7.5e-18, 1.0e-18, 1.0e-18, 9.0e-18);
        let b = Matrix2x4::new(1.0e-18, 0.0, 2.0e-18, 0.0, 0.0, 1.0e-18, 0.0, 3.0e-18);
        let x = spd_solve(&a, &b).expect("scale alone must not be rejected");
        assert!(approx_eq(&(a * x), &b, 1e-30));
    }

    #[test]
    fn t_chol_solve_rejects_singular() {
        let a = Matrix2::new(1.0, 1.0, 1.0, 1.0);
        let b = Matrix2::identity();
        assert!(spd_solve(&a, &b).is_none());
        let zero = Matrix2::<f64>::zeros();
        assert!(spd_solve(&zero, &b).is_none());
    }

    #[test]
    fn t_chol_solve_rejects_indefinite() {
        let a = Matrix2::new(0.0, 1.0, 1.0, 0.0); // eigenvalues {+1, -1}
        assert!(spd_solve(&a, &Matrix2::identity()).is_none());
    }

    #[test]
    fn t_chol_solve_rejects_ill_conditioned() {
        let a = Matrix2::new(1.0, 0.0, 0.0, 1e-20);
        assert!(spd_solve(&a, &Matrix2::identity()).is_none());
        let relaxed = SolveOptions {
            max_condition: 1e21,
        };
        assert!(chol_solve_spd(&a, &Matrix2::identity(), relaxed).is_some());
    }

    #[test]
    fn t_chol_solve_rejects_non_finite() {
        let a = Matrix2::new(f64::NAN, 0.0, 0.0, 1.0);
        assert!(spd_solve(&a, &Matrix2::identity()).is_none());
    }

    #[test]
    fn t_block_diagonal() {
        let a = Matrix2::new(1.0, 2.0, 3.0, 4.0);
        let b = Matrix2::new(5.0, 6.0, 7.0, 8.0);
        let m = block_diagonal(&a, &b);
        assert_approx_eq!(m[(0, 0)], 1.0);
        assert_approx_eq!(m[(0, 1)], 2.0);
        assert_approx_eq!(m[(1, 0)], 3.0);
        assert_approx_eq!(m[(1, 1)], 4.0);
        assert_approx_eq!(m[(2, 2)], 5.0);
        assert_approx_eq!(m[(2, 3)], 6.0);
        assert_approx_eq!(m[(3, 2)], 7.0);
        assert_approx_eq!(m[(3, 3)], 8.0);
        // off-diagonal blocks stay empty
        for i in 0..2 {
            for j in 2..4 {
                assert_eq!(m[(i, j)], 0.0);
                assert_eq!(m[(j, i)], 0.0);
            }
        }
    }

    #[test]
    fn t_covariance_is_valid() {
        let p = Matrix4::from_diagonal(&nalgebra::Vector4::new(1e-12, 2e-12, 3e-12, 4e-12));
        assert!(covariance_is_valid(&p, 1e-9));

        let mut asym = p;
        asym[(0, 1)] = 1e-12;
        assert!(!covariance_is_valid(&asym, 1e-9));

        let mut indefinite = p;
        indefinite[(3, 3)] = -4e-12;
        assert!(!covariance_is_valid(&indefinite, 1e-9));

        let mut nan = p;
        nan[(2, 2)] = f64::NAN;
        assert!(!covariance_is_valid(&nan, 1e-9));

        assert!(covariance_is_valid(&Matrix4::zeros(), 1e-9));
    }
}
