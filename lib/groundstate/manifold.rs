//! Unit-cell versions of the Grassmann manifold operations, acting on a state
//! together with its environments.
//!
//! A point is a pair `(state, environments)`; a tangent vector is one
//! [`GrassmannTangent`] per site of the unit cell, based at the left-canonical
//! tensor `AL` of that site. The metric is twice the real part of the
//! Euclidean (Frobenius) inner product, summed over sites, so that the
//! gradient returned by [`fg`] gives directional derivatives of the energy
//! through [`inner`].

use crate::{
    environments::{ Environments, ac_prime, expectation_value },
    grassmann::{ self, GrassmannTangent },
    imps::InfiniteMPS,
    linalg,
    operator::NNHamiltonian,
    optim::Problem,
    site::SiteTensor,
};

/// A point on the manifold: a state and its environments.
pub type GrassmannPoint = (InfiniteMPS, Environments);

/// A tangent vector: one Grassmann tangent per site.
pub type GrassmannVector = Vec<GrassmannTangent>;

/// Signature of a hook called on every accepted iterate, receiving the point,
/// energy, gradient, and iteration number.
pub type FinalizeFn =
    dyn Fn(GrassmannPoint, f64, GrassmannVector, usize)
        -> (GrassmannPoint, f64, GrassmannVector)
    + Send + Sync;

/// Compute the energy per unit cell and its gradient.
///
/// The gradient at site `v` is the derivative with respect to `AC[v]`
/// (the effective Hamiltonian acting on `AC[v]`), pulled back to `AL[v]`
/// through `AC = AL CR` and then projected onto the tangent space at `AL[v]`.
pub fn fg(x: &GrassmannPoint) -> (f64, GrassmannVector) {
    let (state, envs) = x;
    let f: f64 = expectation_value(state, envs).iter().map(|e| e.re).sum();
    let g: GrassmannVector =
        (0..state.len())
        .map(|v| {
            let dac = ac_prime(state.ac(v), v, state, envs);
            let dal = dac.mul_right(&state.cr(v).adjoint());
            grassmann::project(dal.mat(), state.al(v).mat())
        })
        .collect();
    (f, g)
}

/// Retract every site along `g` by step length `alpha`, returning the new
/// point together with `g` transported to it.
///
/// The new state is rebuilt from the new left-canonical tensors, and its
/// environments are recomputed for `ham`.
///
/// *Panics if `ham` is incompatible with the state's unit cell.*
pub fn retract(
    x: &GrassmannPoint,
    g: &GrassmannVector,
    alpha: f64,
    ham: &NNHamiltonian,
) -> (GrassmannPoint, GrassmannVector)
{
    let (state, _) = x;
    let (al, g_new): (Vec<SiteTensor>, GrassmannVector) =
        g.iter().enumerate()
        .map(|(v, gv)| {
            let a = state.al(v);
            let (w_new, gv_new) = grassmann::retract(a.mat(), gv, alpha);
            (SiteTensor::from_lfused(a.phys(), w_new), gv_new)
        })
        .unzip();
    // shapes are unchanged, so neither of these can fail
    let Ok(state_new) = InfiniteMPS::from_al(al) else { unreachable!() };
    let Ok(envs_new) = Environments::new(&state_new, ham) else {
        panic!("inconsistent dimensions")
    };
    ((state_new, envs_new), g_new)
}

/// Transport `h` from `x` to `xp`, where `xp` is the result of retracting
/// along `g` by `alpha`.
pub fn transport(
    h: &GrassmannVector,
    x: &GrassmannPoint,
    g: &GrassmannVector,
    alpha: f64,
    xp: &GrassmannPoint,
) -> GrassmannVector
{
    let (state, _) = x;
    let (state_new, _) = xp;
    h.iter().zip(g).enumerate()
        .map(|(v, (hv, gv))| {
            grassmann::transport(
                hv, state.al(v).mat(), gv, alpha, state_new.al(v).mat())
        })
        .collect()
}

/// Inner product of two tangents at `x`.
pub fn inner(x: &GrassmannPoint, g1: &GrassmannVector, g2: &GrassmannVector)
    -> f64
{
    let (state, _) = x;
    2.0 * g1.iter().zip(g2).enumerate()
        .map(|(v, (a, b))| grassmann::inner(state.al(v).mat(), a, b))
        .sum::<f64>()
}

/// Multiply a tangent by a real scalar.
pub fn scale(g: GrassmannVector, c: f64) -> GrassmannVector {
    g.into_iter().map(|gv| gv.scale(c)).collect()
}

/// Return `g1 + c · g2`.
pub fn add(g1: GrassmannVector, g2: &GrassmannVector, c: f64) -> GrassmannVector {
    g1.into_iter().zip(g2).map(|(a, b)| a.add(b, c)).collect()
}

/// Precondition the gradient `g` with the inverse of the metric induced by
/// the bond matrices.
///
/// Each site's tangent matrix is multiplied on the right by `C⁻¹† C⁻¹`, where
/// `C⁻¹` is the regularized inverse of `CR` with regularization
/// `δ = min(1, ‖g‖)`, and the result projected back onto the tangent space.
pub fn precondition(x: &GrassmannPoint, g: GrassmannVector) -> GrassmannVector {
    let (state, _) = x;
    let delta = inner(x, &g, &g).max(0.0).sqrt().min(1.0);
    g.iter().enumerate()
        .map(|(v, gv)| {
            let crinv = linalg::reginv(state.cr(v), delta);
            let z = gv.z() * crinv.adjoint() * &crinv;
            grassmann::project(&z, state.al(v).mat())
        })
        .collect()
}

/// Energy minimization over a state for a fixed Hamiltonian.
pub struct GrassmannProblem<'a> {
    ham: &'a NNHamiltonian,
    finalize: Option<&'a FinalizeFn>,
}

impl<'a> GrassmannProblem<'a> {
    pub fn new(ham: &'a NNHamiltonian) -> Self {
        Self { ham, finalize: None }
    }

    /// Call `finalize` after every accepted step.
    pub fn with_finalize(mut self, finalize: &'a FinalizeFn) -> Self {
        self.finalize = Some(finalize);
        self
    }
}

impl<'a> Problem for GrassmannProblem<'a> {
    type Point = GrassmannPoint;
    type Tangent = GrassmannVector;

    fn fg(&self, x: &GrassmannPoint) -> (f64, GrassmannVector) { fg(x) }

    fn retract(&self, x: &GrassmannPoint, d: &GrassmannVector, alpha: f64)
        -> (GrassmannPoint, GrassmannVector)
    {
        retract(x, d, alpha, self.ham)
    }

    fn transport(
        &self,
        h: &GrassmannVector,
        x: &GrassmannPoint,
        d: &GrassmannVector,
        alpha: f64,
        xp: &GrassmannPoint,
    ) -> GrassmannVector
    {
        transport(h, x, d, alpha, xp)
    }

    fn inner(&self, x: &GrassmannPoint, a: &GrassmannVector, b: &GrassmannVector)
        -> f64
    {
        inner(x, a, b)
    }

    fn scale(&self, a: GrassmannVector, c: f64) -> GrassmannVector { scale(a, c) }

    fn add(&self, a: GrassmannVector, b: &GrassmannVector, c: f64)
        -> GrassmannVector
    {
        add(a, b, c)
    }

    fn precondition(&self, x: &GrassmannPoint, g: GrassmannVector)
        -> GrassmannVector
    {
        precondition(x, g)
    }

    fn finalize(&self, x: GrassmannPoint, f: f64, g: GrassmannVector, iter: usize)
        -> (GrassmannPoint, f64, GrassmannVector)
    {
        match self.finalize {
            Some(fin) => fin(x, f, g, iter),
            None => (x, f, g),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra as na;
    use num_complex::Complex64 as C64;
    use rand::{ SeedableRng, rngs::StdRng };

    fn point(seed: u64, ham: &NNHamiltonian, phys: &[usize], bond: &[usize])
        -> GrassmannPoint
    {
        let mut rng = StdRng::seed_from_u64(seed);
        let state = InfiniteMPS::random(phys, bond, &mut rng).unwrap();
        let envs = Environments::new(&state, ham).unwrap();
        (state, envs)
    }

    #[test]
    fn gradient_is_tangent() {
        let ham = NNHamiltonian::transverse_field_ising(1.0, 0.7).repeat(2);
        let x = point(1, &ham, &[2, 2], &[3, 4]);
        let (f, g) = fg(&x);
        assert!(f.is_finite());
        for (v, gv) in g.iter().enumerate() {
            let overlap = x.0.al(v).mat().adjoint() * gv.z();
            assert_abs_diff_eq!(overlap.norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let ham = NNHamiltonian::xxz(0.5, 1.0, 0.5).unwrap().repeat(2);
        let x = point(2, &ham, &[2, 2], &[2, 3]);
        let (_, g) = fg(&x);
        let slope = inner(&x, &g, &g);
        let alpha = 1e-5;
        let (xp, _) = retract(&x, &g, alpha, &ham);
        let (xm, _) = retract(&x, &g, -alpha, &ham);
        let (fp, _) = fg(&xp);
        let (fm, _) = fg(&xm);
        let fd = (fp - fm) / (2.0 * alpha);
        assert_abs_diff_eq!(fd, slope, epsilon = 1e-6 * slope.abs().max(1.0));
    }

    #[test]
    fn retracted_state_stays_canonical() {
        let ham = NNHamiltonian::aklt();
        let x = point(3, &ham, &[3], &[4]);
        let (_, g) = fg(&x);
        let d = scale(g, -1.0);
        let ((state, _), d_new) = retract(&x, &d, 0.3, &ham);
        assert!(state.left_isometry_error(0) < 1e-12);
        assert!(state.right_isometry_error(0) < 1e-10);
        assert!(state.gauge_error(0) < 1e-10);
        let overlap = state.al(0).mat().adjoint() * d_new[0].z();
        assert_abs_diff_eq!(overlap.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn transport_preserves_inner_products() {
        let ham = NNHamiltonian::transverse_field_ising(1.0, 1.1);
        let x = point(4, &ham, &[2], &[4]);
        let (_, g) = fg(&x);
        let h = precondition(&x, g.clone());
        let alpha = 0.2;
        let (xp, g_new) = retract(&x, &g, alpha, &ham);
        let h_new = transport(&h, &x, &g, alpha, &xp);
        assert_abs_diff_eq!(inner(&xp, &h_new, &g_new), inner(&x, &h, &g), epsilon = 1e-10);
        let g_tr = transport(&g, &x, &g, alpha, &xp);
        assert_abs_diff_eq!(inner(&xp, &g_tr, &g_tr), inner(&x, &g, &g), epsilon = 1e-10);
    }

    #[test]
    fn preconditioned_gradient_is_tangent_descent_direction() {
        let ham = NNHamiltonian::transverse_field_ising(1.0, 0.9).repeat(2);
        let x = point(5, &ham, &[2, 2], &[4, 3]);
        let (_, g) = fg(&x);
        let pg = precondition(&x, g.clone());
        for (v, pv) in pg.iter().enumerate() {
            let overlap = x.0.al(v).mat().adjoint() * pv.z();
            assert_abs_diff_eq!(overlap.norm(), 0.0, epsilon = 1e-10);
        }
        assert!(inner(&x, &g, &pg) > 0.0);
    }

    // precondition by hand, with an explicit regularization
    fn precondition_with(x: &GrassmannPoint, g: &GrassmannVector, delta: f64)
        -> GrassmannVector
    {
        g.iter().enumerate()
            .map(|(v, gv)| {
                let crinv = linalg::reginv(x.0.cr(v), delta);
                let z = gv.z() * crinv.adjoint() * &crinv;
                grassmann::project(&z, x.0.al(v).mat())
            })
            .collect()
    }

    fn assert_same(a: &GrassmannVector, b: &GrassmannVector, eps: f64) {
        for (av, bv) in a.iter().zip(b) {
            assert_abs_diff_eq!((av.z() - bv.z()).norm(), 0.0, epsilon = eps);
        }
    }

    #[test]
    fn preconditioner_regularization() {
        let ham = NNHamiltonian::transverse_field_ising(1.0, 0.9).repeat(2);
        let x = point(7, &ham, &[2, 2], &[4, 3]);
        let (_, g) = fg(&x);
        let gnorm = inner(&x, &g, &g).sqrt();

        // small gradient: δ = ‖g‖
        let small = scale(g.clone(), 1e-3 / gnorm);
        let pg = precondition(&x, small.clone());
        assert_same(&pg, &precondition_with(&x, &small, 1e-3), 1e-8);

        // large gradient: δ is capped at 1
        let large = scale(g.clone(), 10.0 / gnorm);
        let pg = precondition(&x, large.clone());
        assert_same(&pg, &precondition_with(&x, &large, 1.0), 1e-10);
        let uncapped = precondition_with(&x, &large, 10.0);
        let diff: f64 =
            pg.iter().zip(&uncapped)
            .map(|(a, b)| (a.z() - b.z()).norm())
            .sum();
        assert!(diff > 1e-3);
    }

    #[test]
    fn preconditioner_near_singular_bond() {
        let ham = NNHamiltonian::transverse_field_ising(1.0, 0.9);
        let (mut state, envs) = point(8, &ham, &[2], &[2]);
        state.cr[0] =
            na::DMatrix::from_diagonal(&na::dvector![C64::from(1.0), C64::from(1e-10)]);
        let x = (state, envs);
        let (_, g) = fg(&x);
        let gnorm = inner(&x, &g, &g).sqrt();

        for target in [1e-4, 0.5, 10.0] {
            let gt = scale(g.clone(), target / gnorm);
            let pg = precondition(&x, gt.clone());
            let delta = target.min(1.0);
            assert!(pg.iter().all(|pv| pv.z().iter().all(|a| a.re.is_finite() && a.im.is_finite())));
            // ‖C⁻¹‖ ≤ 1/δ
            assert!(pg[0].norm() <= gt[0].norm() / delta.powi(2) * (1.0 + 1e-10));
            assert_same(&pg, &precondition_with(&x, &gt, delta), 1e-8 * pg[0].norm().max(1.0));
            let overlap = x.0.al(0).mat().adjoint() * pg[0].z();
            assert_abs_diff_eq!(overlap.norm(), 0.0, epsilon = 1e-8 * pg[0].norm().max(1.0));
        }
    }

    #[test]
    fn scale_and_add_are_sitewise() {
        let ham = NNHamiltonian::transverse_field_ising(1.0, 0.5).repeat(2);
        let x = point(6, &ham, &[2, 2], &[2, 2]);
        let (_, g) = fg(&x);
        let two_g = add(g.clone(), &g, 1.0);
        let also = scale(g.clone(), 2.0);
        for (a, b) in two_g.iter().zip(&also) {
            assert_abs_diff_eq!((a.z() - b.z()).norm(), 0.0, epsilon = 1e-14);
        }
        assert_abs_diff_eq!(inner(&x, &two_g, &g), 2.0 * inner(&x, &g, &g), epsilon = 1e-12);
    }
}
