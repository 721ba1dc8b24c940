//! Nearest-neighbor Hamiltonians for infinite chains.
//!
//! A Hamiltonian is given as a periodic sequence of two-site "bond" terms,
//!
//! ```text
//! H = Σ_j h[j mod P] acting on sites (j, j + 1),
//! ```
//!
//! where each `h[k]` is a `(d_k d_{k+1}) × (d_k d_{k+1})` Hermitian matrix.
//! Two-site operators use the Kronecker convention of [`na::Matrix::kronecker`]:
//! the composite row/column index is `s·d_{k+1} + t` for local states `s` on
//! the left site and `t` on the right site. Single-site terms are folded into
//! the bond terms.

use itertools::Itertools;
use nalgebra as na;
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use once_cell::sync::Lazy;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HamiltonianError {
    /// Returned when attempting to create a Hamiltonian with no bond terms.
    #[error("error in Hamiltonian creation: no bond terms")]
    Empty,

    /// Returned when a bond term doesn't have the shape implied by the
    /// physical dimensions of its two sites.
    #[error("error in Hamiltonian creation: bond term {bond} has shape {shape:?}, expected ({expected}, {expected})")]
    BondTermShape { bond: usize, shape: (usize, usize), expected: usize },

    /// Returned when attempting to use a Hamiltonian with a state whose unit
    /// cell is not a multiple of the Hamiltonian's period, or whose physical
    /// dimensions differ.
    #[error("Hamiltonian with period {period} is incompatible with a unit cell of length {cell}")]
    IncompatibleUnitCell { period: usize, cell: usize },

    /// Returned when attempting to construct spin operators for a spin that
    /// isn't a non-negative multiple of 1/2.
    #[error("invalid spin: {0}")]
    InvalidSpin(f64),
}
use HamiltonianError::*;
pub type HamiltonianResult<T> = Result<T, HamiltonianError>;

/// Make a Pauli X matrix.
pub fn make_x() -> na::DMatrix<C64> {
    na::dmatrix!(
        C64::zero(), C64::one();
        C64::one(),  C64::zero();
    )
}

/// Lazy-static version of [`make_x`].
pub static XMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_x);

/// Make a Pauli Y matrix.
pub fn make_y() -> na::DMatrix<C64> {
    na::dmatrix!(
        C64::zero(), -C64::i();
        C64::i(),     C64::zero();
    )
}

/// Lazy-static version of [`make_y`].
pub static YMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_y);

/// Make a Pauli Z matrix.
pub fn make_z() -> na::DMatrix<C64> {
    na::dmatrix!(
        C64::one(),  C64::zero();
        C64::zero(), -C64::one();
    )
}

/// Lazy-static version of [`make_z`].
pub static ZMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_z);

/// Spin operators `(Sx, Sy, Sz)` for a single spin-*S* particle.
///
/// Basis states are ordered by decreasing magnetic quantum number, `m = S, S −
/// 1, ..., −S`, so that for spin-1/2, `(Sx, Sy, Sz)` are half the Pauli
/// matrices.
#[derive(Clone, Debug, PartialEq)]
pub struct SpinOps {
    pub sx: na::DMatrix<C64>,
    pub sy: na::DMatrix<C64>,
    pub sz: na::DMatrix<C64>,
}

impl SpinOps {
    /// Construct spin operators for spin `spin`.
    ///
    /// Fails if `2 * spin` is not a non-negative integer.
    pub fn new(spin: f64) -> HamiltonianResult<Self> {
        let two_s = 2.0 * spin;
        if !two_s.is_finite() || two_s < 0.0 || (two_s - two_s.round()).abs() > 1e-12 {
            return Err(InvalidSpin(spin));
        }
        let d = two_s.round() as usize + 1;
        let m = |k: usize| spin - k as f64;
        // ⟨m + 1| S+ |m⟩ = sqrt(S(S + 1) − m(m + 1))
        let splus: na::DMatrix<C64> =
            na::DMatrix::from_fn(d, d, |i, j| {
                if j == i + 1 {
                    let mj = m(j);
                    C64::from((spin * (spin + 1.0) - mj * (mj + 1.0)).sqrt())
                } else {
                    C64::zero()
                }
            });
        let sminus = splus.adjoint();
        let sx = (&splus + &sminus).scale(0.5);
        let sy = (&splus - &sminus) * C64::new(0.0, -0.5);
        let sz: na::DMatrix<C64> =
            na::DMatrix::from_diagonal(
                &na::DVector::from_fn(d, |k, _| C64::from(m(k))));
        Ok(Self { sx, sy, sz })
    }

    /// Return the local Hilbert space dimension, `2S + 1`.
    pub fn dim(&self) -> usize { self.sz.nrows() }

    /// Return the two-site exchange operator `S·S = Sx⊗Sx + Sy⊗Sy + Sz⊗Sz`.
    pub fn exchange(&self) -> na::DMatrix<C64> {
        self.sx.kronecker(&self.sx)
            + self.sy.kronecker(&self.sy)
            + self.sz.kronecker(&self.sz)
    }
}

/// A nearest-neighbor Hamiltonian with a periodic sequence of bond terms.
#[derive(Clone, Debug, PartialEq)]
pub struct NNHamiltonian {
    // physical dimension of each site in one period
    phys: Vec<usize>,
    // bond terms; `terms[k]` acts on sites (k, k + 1 mod period)
    terms: Vec<na::DMatrix<C64>>,
}

impl NNHamiltonian {
    /// Create a new Hamiltonian from physical dimensions and bond terms, one
    /// per site of a single period.
    ///
    /// Fails if no terms are given, the number of terms and dimensions differ,
    /// or a bond term doesn't have the shape implied by the dimensions.
    pub fn new<I, J>(phys: I, terms: J) -> HamiltonianResult<Self>
    where
        I: IntoIterator<Item = usize>,
        J: IntoIterator<Item = na::DMatrix<C64>>,
    {
        let phys: Vec<usize> = phys.into_iter().collect();
        let terms: Vec<na::DMatrix<C64>> = terms.into_iter().collect();
        if terms.is_empty() { return Err(Empty); }
        if phys.len() != terms.len() {
            return Err(IncompatibleUnitCell {
                period: terms.len(), cell: phys.len() });
        }
        let period = phys.len();
        for (k, h) in terms.iter().enumerate() {
            let expected = phys[k] * phys[(k + 1) % period];
            if h.shape() != (expected, expected) {
                return Err(BondTermShape { bond: k, shape: h.shape(), expected });
            }
        }
        Ok(Self { phys, terms })
    }

    /// Create a translation-invariant Hamiltonian from a single bond term on
    /// sites of dimension `phys`.
    pub fn uniform(phys: usize, term: na::DMatrix<C64>)
        -> HamiltonianResult<Self>
    {
        Self::new([phys], [term])
    }

    /// Transverse-field Ising model, `H = −J Σ Z_j Z_{j+1} − g Σ X_j`.
    pub fn transverse_field_ising(j: f64, g: f64) -> Self {
        let id = na::DMatrix::<C64>::identity(2, 2);
        let zz = ZMAT.kronecker(&*ZMAT);
        let x = XMAT.kronecker(&id) + id.kronecker(&*XMAT);
        let term = zz.scale(-j) - x.scale(0.5 * g);
        Self { phys: vec![2], terms: vec![term] }
    }

    /// Spin-*S* XXZ model, `H = J Σ (Sx Sx + Sy Sy + Δ Sz Sz)`.
    pub fn xxz(spin: f64, j: f64, delta: f64) -> HamiltonianResult<Self> {
        let ops = SpinOps::new(spin)?;
        let term =
            (ops.sx.kronecker(&ops.sx)
                + ops.sy.kronecker(&ops.sy)
                + ops.sz.kronecker(&ops.sz).scale(delta))
            .scale(j);
        Ok(Self { phys: vec![ops.dim()], terms: vec![term] })
    }

    /// Spin-1 AKLT model, `H = Σ [S·S + (S·S)² / 3]`, whose ground state is an
    /// exact MPS of bond dimension 2 with energy density −2/3.
    pub fn aklt() -> Self {
        let Ok(ops) = SpinOps::new(1.0) else { unreachable!() };
        let ss = ops.exchange();
        let term = &ss + (&ss * &ss).scale(1.0 / 3.0);
        Self { phys: vec![3], terms: vec![term] }
    }

    /// Return the number of bonds in one period.
    pub fn period(&self) -> usize { self.terms.len() }

    /// Return the physical dimension of site `k` (taken periodically).
    pub fn phys(&self, k: usize) -> usize { self.phys[k % self.phys.len()] }

    /// Return the term acting on sites `(k, k + 1)` (taken periodically).
    pub fn bond(&self, k: usize) -> &na::DMatrix<C64> {
        &self.terms[k % self.terms.len()]
    }

    /// Check that the Hamiltonian can act on a unit cell with the given
    /// physical dimensions.
    pub fn check_unit_cell(&self, phys: &[usize]) -> HamiltonianResult<()> {
        let cell = phys.len();
        let period = self.period();
        if cell == 0 || cell % period != 0
            || phys.iter().enumerate().any(|(k, d)| *d != self.phys(k))
        {
            return Err(IncompatibleUnitCell { period, cell });
        }
        Ok(())
    }

    /// Return `true` if every bond term is Hermitian to within `tol`.
    pub fn is_hermitian(&self, tol: f64) -> bool {
        self.terms.iter().all(|h| (h - h.adjoint()).norm() <= tol)
    }

    /// Return the Hamiltonian repeated to cover `n` periods.
    pub fn repeat(&self, n: usize) -> Self {
        let phys: Vec<usize> =
            (0..n).cartesian_product(self.phys.iter())
            .map(|(_, d)| *d)
            .collect();
        let terms: Vec<na::DMatrix<C64>> =
            (0..n).cartesian_product(self.terms.iter())
            .map(|(_, h)| h.clone())
            .collect();
        Self { phys, terms }
    }
}

/// Exact ground-state energy density of the transverse-field Ising chain
/// `H = −J Σ Z Z − g Σ X` in the thermodynamic limit,
///
/// ```text
/// e₀ = −(1/π) ∫₀^π sqrt(J² + g² − 2 J g cos k) dk,
/// ```
///
/// evaluated with composite Simpson's rule.
pub fn ising_exact_energy(j: f64, g: f64) -> f64 {
    const N: usize = 20_000; // even
    let f = |k: f64| (j * j + g * g - 2.0 * j * g * k.cos()).max(0.0).sqrt();
    let h = std::f64::consts::PI / N as f64;
    let interior: f64 =
        (1..N)
        .map(|n| {
            let w = if n % 2 == 1 { 4.0 } else { 2.0 };
            w * f(n as f64 * h)
        })
        .sum();
    let integral = h / 3.0 * (f(0.0) + interior + f(std::f64::consts::PI));
    -integral / std::f64::consts::PI
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn spin_half_matches_pauli() {
        let ops = SpinOps::new(0.5).unwrap();
        assert_abs_diff_eq!((ops.sx.scale(2.0) - &*XMAT).norm(), 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!((ops.sy.scale(2.0) - &*YMAT).norm(), 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!((ops.sz.scale(2.0) - &*ZMAT).norm(), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn spin_one_casimir() {
        let ops = SpinOps::new(1.0).unwrap();
        let s2 = &ops.sx * &ops.sx + &ops.sy * &ops.sy + &ops.sz * &ops.sz;
        let expected = na::DMatrix::<C64>::identity(3, 3).scale(2.0);
        assert_abs_diff_eq!((s2 - expected).norm(), 0.0, epsilon = 1e-13);
        // [Sx, Sy] = i Sz
        let comm = &ops.sx * &ops.sy - &ops.sy * &ops.sx;
        assert_abs_diff_eq!((comm - &ops.sz * C64::i()).norm(), 0.0, epsilon = 1e-13);
    }

    #[test]
    fn invalid_spin_rejected() {
        assert!(matches!(SpinOps::new(0.3), Err(InvalidSpin(_))));
        assert!(matches!(SpinOps::new(-1.0), Err(InvalidSpin(_))));
    }

    #[test]
    fn models_are_hermitian() {
        assert!(NNHamiltonian::transverse_field_ising(1.0, 0.7).is_hermitian(1e-14));
        assert!(NNHamiltonian::xxz(0.5, 1.0, 0.4).unwrap().is_hermitian(1e-14));
        assert!(NNHamiltonian::aklt().is_hermitian(1e-13));
    }

    #[test]
    fn aklt_bond_spectrum() {
        // S·S + (S·S)²/3 on two spin-1s is 4/3 on total spin 2 and −2/3 on
        // total spin 0 and 1
        let h = NNHamiltonian::aklt();
        let eig = h.bond(0).clone().symmetric_eigen();
        let mut vals: Vec<f64> = eig.eigenvalues.iter().copied().collect();
        vals.sort_by(|a, b| a.total_cmp(b));
        vals[..4].iter().for_each(|v| assert_abs_diff_eq!(*v, -2.0 / 3.0, epsilon = 1e-12));
        vals[4..].iter().for_each(|v| assert_abs_diff_eq!(*v, 4.0 / 3.0, epsilon = 1e-12));
    }

    #[test]
    fn shape_validation() {
        let bad = na::DMatrix::<C64>::identity(3, 3);
        assert!(matches!(
            NNHamiltonian::uniform(2, bad),
            Err(BondTermShape { bond: 0, shape: (3, 3), expected: 4 }),
        ));
        let h = NNHamiltonian::transverse_field_ising(1.0, 1.0).repeat(2);
        assert_eq!(h.period(), 2);
        assert!(h.check_unit_cell(&[2, 2]).is_ok());
        assert!(h.check_unit_cell(&[2, 2, 2, 2]).is_ok());
        assert!(matches!(
            h.check_unit_cell(&[2, 2, 2]),
            Err(IncompatibleUnitCell { period: 2, cell: 3 }),
        ));
        assert!(h.check_unit_cell(&[3, 3]).is_err());
    }

    #[test]
    fn ising_exact_limits() {
        assert_abs_diff_eq!(ising_exact_energy(1.0, 0.0), -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            ising_exact_energy(1.0, 1.0), -4.0 / std::f64::consts::PI, epsilon = 1e-9);
        // self-duality: e(J, g) = e(g, J)
        assert_abs_diff_eq!(
            ising_exact_energy(1.0, 2.0), ising_exact_energy(2.0, 1.0), epsilon = 1e-12);
    }
}
