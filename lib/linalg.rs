//! Small dense linear-algebra routines on top of `nalgebra` used throughout
//! the crate: regularized inversion, polar decomposition, Hermitian square
//! roots, and solvers for linear maps on square matrices (e.g. transfer
//! matrices acting on bond-space operators).

use nalgebra as na;
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };

/// Compute a Tikhonov-regularized inverse of `m`.
///
/// With `m = U S V†`, this returns `V (S² + δ²)^(-1/2) U†`, where the
/// effective regularization is `δ = max(delta, sqrt(ε))` for machine epsilon
/// `ε`. The result therefore has spectral norm at most `1 / δ` no matter how
/// badly conditioned (or singular) `m` is, and approaches the exact inverse as
/// `δ → 0` for well-conditioned `m`.
pub fn reginv(m: &na::DMatrix<C64>, delta: f64) -> na::DMatrix<C64> {
    let delta = delta.max(f64::EPSILON.sqrt());
    let svd = m.clone().svd(true, true);
    let Some(u) = svd.u else { unreachable!() };
    let Some(v_t) = svd.v_t else { unreachable!() };
    let sinv: na::DVector<C64> =
        svd.singular_values.map(|s| {
            C64::from((s.powi(2) + delta.powi(2)).sqrt().recip())
        });
    v_t.adjoint() * na::DMatrix::from_diagonal(&sinv) * u.adjoint()
}

/// Return the isometric factor of the polar decomposition of `m`.
///
/// For `m = U S V†` (thin SVD), this is `U V†`, the isometry closest to `m` in
/// Frobenius norm. `m` is expected to have at least as many rows as columns.
pub fn polar(m: &na::DMatrix<C64>) -> na::DMatrix<C64> {
    let svd = m.clone().svd(true, true);
    let Some(u) = svd.u else { unreachable!() };
    let Some(v_t) = svd.v_t else { unreachable!() };
    u * v_t
}

/// Return the positive semi-definite square root of a Hermitian matrix.
///
/// `rho` is symmetrized before diagonalization and negative eigenvalues
/// (arising from rounding) are clipped to zero.
pub fn herm_sqrt(rho: &na::DMatrix<C64>) -> na::DMatrix<C64> {
    let herm = hermitian_part(rho);
    let eig = herm.symmetric_eigen();
    let sqrt_vals: na::DVector<C64> =
        eig.eigenvalues.map(|l| C64::from(l.max(0.0).sqrt()));
    &eig.eigenvectors
        * na::DMatrix::from_diagonal(&sqrt_vals)
        * eig.eigenvectors.adjoint()
}

/// Return `(m + m†) / 2`.
pub fn hermitian_part(m: &na::DMatrix<C64>) -> na::DMatrix<C64> {
    (m + m.adjoint()).scale(0.5)
}

/// Flatten a square operator into a column vector (column-major order).
pub(crate) fn vectorize(m: &na::DMatrix<C64>) -> na::DVector<C64> {
    na::DVector::from_column_slice(m.as_slice())
}

/// Inverse of [`vectorize`] for a `dim × dim` operator.
pub(crate) fn unvectorize(v: &na::DVector<C64>, dim: usize)
    -> na::DMatrix<C64>
{
    na::DMatrix::from_column_slice(dim, dim, v.as_slice())
}

/// Build the dense `dim² × dim²` matrix representation of a linear map acting
/// on `dim × dim` operators.
pub(crate) fn dense_map<F>(dim: usize, f: F) -> na::DMatrix<C64>
where F: Fn(&na::DMatrix<C64>) -> na::DMatrix<C64>
{
    let n = dim * dim;
    let mut mat: na::DMatrix<C64> = na::DMatrix::zeros(n, n);
    let mut basis: na::DMatrix<C64> = na::DMatrix::zeros(dim, dim);
    for k in 0..n {
        basis[k] = C64::one();
        let image = f(&basis);
        mat.column_mut(k).copy_from_slice(image.as_slice());
        basis[k] = C64::zero();
    }
    mat
}

/// Solve `a x = b` for square `a`, falling back to a least-squares solution
/// via SVD if the LU factorization is singular.
pub(crate) fn solve_dense(a: na::DMatrix<C64>, b: &na::DVector<C64>)
    -> na::DVector<C64>
{
    if let Some(x) = a.clone().lu().solve(b) {
        if x.iter().all(|xk| xk.re.is_finite() && xk.im.is_finite()) {
            return x;
        }
    }
    let svd = a.svd(true, true);
    match svd.solve(b, f64::EPSILON) {
        Ok(x) => x,
        Err(_) => unreachable!(),
    }
}

/// Find the fixed point `x = f(x)` of a linear map on `dim × dim` operators,
/// assuming the map has a (non-degenerate) eigenvalue equal to 1.
///
/// The fixed point is computed as the right-singular vector of `F − 1` with
/// the smallest singular value, then made Hermitian, given a positive trace,
/// and normalized to unit trace.
pub(crate) fn fixed_point<F>(dim: usize, f: F) -> na::DMatrix<C64>
where F: Fn(&na::DMatrix<C64>) -> na::DMatrix<C64>
{
    let n = dim * dim;
    let shifted = dense_map(dim, f) - na::DMatrix::<C64>::identity(n, n);
    let svd = shifted.svd(false, true);
    let Some(v_t) = svd.v_t else { unreachable!() };
    let kmin =
        svd.singular_values.iter().enumerate()
        .fold((0, f64::INFINITY), |(kacc, sacc), (k, s)| {
            if *s < sacc { (k, *s) } else { (kacc, sacc) }
        })
        .0;
    let v: na::DVector<C64> = v_t.row(kmin).adjoint();
    let mut x = unvectorize(&v, dim);
    let tr = x.trace();
    x /= tr;
    hermitian_part(&x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn spectral_norm(m: &na::DMatrix<C64>) -> f64 {
        m.clone().svd(false, false).singular_values
            .iter()
            .copied()
            .fold(0.0, f64::max)
    }

    #[test]
    fn reginv_zero_matrix_is_bounded() {
        let zero: na::DMatrix<C64> = na::DMatrix::zeros(3, 3);
        for delta in [1e-3, 0.1, 1.0] {
            let inv = reginv(&zero, delta);
            assert!(spectral_norm(&inv) <= 1.0 / delta + 1e-12);
        }
        let inv = reginv(&zero, 0.0);
        assert!(inv.iter().all(|x| x.re.is_finite() && x.im.is_finite()));
        assert!(spectral_norm(&inv) <= 1.0 / f64::EPSILON.sqrt() * (1.0 + 1e-12));
    }

    #[test]
    fn reginv_recovers_inverse_of_well_conditioned() {
        let m: na::DMatrix<C64> =
            na::dmatrix!(
                C64::new(2.0, 0.5), C64::new(0.3, 0.0);
                C64::new(-0.1, 0.2), C64::new(1.5, -0.4);
            );
        let inv = reginv(&m, 0.0);
        let id = &m * &inv;
        let diff = id - na::DMatrix::<C64>::identity(2, 2);
        assert_abs_diff_eq!(diff.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn polar_is_isometric() {
        let m: na::DMatrix<C64> =
            na::DMatrix::from_fn(5, 2, |i, j| {
                C64::new((i + 2 * j) as f64 * 0.3 - 0.7, (i * j) as f64 * 0.1)
            });
        let w = polar(&m);
        let diff = w.adjoint() * &w - na::DMatrix::<C64>::identity(2, 2);
        assert_abs_diff_eq!(diff.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn herm_sqrt_squares_back() {
        let a: na::DMatrix<C64> =
            na::dmatrix!(
                C64::new(1.0, 0.0), C64::new(0.2, 0.3);
                C64::new(0.0, -0.5), C64::new(0.7, 0.0);
            );
        let rho = &a * a.adjoint();
        let s = herm_sqrt(&rho);
        assert_abs_diff_eq!((&s * &s - &rho).norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!((&s - s.adjoint()).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn fixed_point_of_conjugation() {
        // half of x plus a quarter of its trace along the identity; the only
        // fixed points are multiples of the identity
        let f = |x: &na::DMatrix<C64>| -> na::DMatrix<C64> {
            let id = na::DMatrix::<C64>::identity(2, 2);
            x.scale(0.5) + id * (x.trace() * C64::from(0.25))
        };
        let rho = fixed_point(2, f);
        let expected = na::DMatrix::<C64>::identity(2, 2).scale(0.5);
        assert_abs_diff_eq!((rho - expected).norm(), 0.0, epsilon = 1e-12);
    }
}
