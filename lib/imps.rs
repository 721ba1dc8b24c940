//! Translation-invariant matrix product states on an infinite chain, in mixed
//! canonical form.
//!
//! The state is specified by a unit cell of `L` site tensors that repeats
//! infinitely in both directions. For every position `i` of the unit cell
//! (taken mod `L`), four tensors are kept:
//!
//! * `AL[i]`, left-canonical: `Σ_s AL[i][s]† AL[i][s] = 1`
//! * `AR[i]`, right-canonical: `Σ_s AR[i][s] AR[i][s]† = 1`
//! * `CR[i]`, the bond matrix on the bond to the right of site `i`
//! * `AC[i] = AL[i] · CR[i] = CR[i − 1] · AR[i]`, the center-gauge tensor
//!
//! ```text
//!    ... --- AL[i-1] --- AL[i] --- CR[i] --- AR[i+1] --- AR[i+2] --- ...
//!               |          |                    |           |
//! ```
//!
//! A state is always built from a sequence of left-canonical tensors (see
//! [`InfiniteMPS::from_al`]); everything else is derived from them. States are
//! never modified in place.

use std::fmt;
use nalgebra as na;
use num_complex::Complex64 as C64;
use rand::Rng;
use statrs::distribution::Normal;
use thiserror::Error;
use crate::{
    linalg,
    site::SiteTensor,
};

#[derive(Debug, Error)]
pub enum IMPSError {
    /// Returned when attempting to create a state with an empty unit cell.
    #[error("error in infinite MPS creation: empty unit cell")]
    EmptyUnitCell,

    /// Returned when attempting to create a state with a zero-dimensional
    /// physical or bond index.
    #[error("error in infinite MPS creation: zero-dimensional index at site {0}")]
    ZeroDim(usize),

    /// Returned when the right bond of one site doesn't match the left bond of
    /// the next.
    #[error("error in infinite MPS creation: bond dimension mismatch between sites {0} and {1}")]
    IncompatibleBondDims(usize, usize),

    /// Returned when a site tensor cannot be left-isometric because its right
    /// bond dimension exceeds the product of its left bond and physical
    /// dimensions.
    #[error("error in infinite MPS creation: bond dimension at site {0} is too large")]
    BondDimTooLarge(usize),

    /// Returned when physical and bond dimension lists have different lengths.
    #[error("error in infinite MPS creation: {0} physical dimensions but {1} bond dimensions")]
    UnitCellMismatch(usize, usize),
}
use IMPSError::*;
pub type IMPSResult<T> = Result<T, IMPSError>;

/// An infinite, translation-invariant MPS in mixed canonical form.
#[derive(Clone, PartialEq)]
pub struct InfiniteMPS {
    // Unit cell length.
    pub(crate) n: usize, // ≥ 1
    // Left-canonical tensors.
    pub(crate) al: Vec<SiteTensor>, // length n
    // Right-canonical tensors.
    pub(crate) ar: Vec<SiteTensor>, // length n
    // Center-gauge tensors.
    pub(crate) ac: Vec<SiteTensor>, // length n
    // Bond matrices; `cr[i]` sits on the bond between sites i and i + 1.
    pub(crate) cr: Vec<na::DMatrix<C64>>, // length n
}

impl InfiniteMPS {
    /// Build a state from a unit cell of left-canonical tensors.
    ///
    /// The bond matrices are taken as the Hermitian square roots of the right
    /// fixed points of the left transfer matrices, normalized to unit trace,
    /// and the right-canonical tensors are recovered from the center-gauge
    /// tensors by polar decomposition. The tensors in `al` are kept as-is and
    /// are assumed to be left-isometric.
    ///
    /// Fails if `al` is empty or neighboring bond dimensions don't match.
    pub fn from_al<I>(al: I) -> IMPSResult<Self>
    where I: IntoIterator<Item = SiteTensor>
    {
        let al: Vec<SiteTensor> = al.into_iter().collect();
        if al.is_empty() { return Err(EmptyUnitCell); }
        let n = al.len();
        for (k, a) in al.iter().enumerate() {
            let (dl, d, dr) = a.dims();
            if dl == 0 || d == 0 || dr == 0 { return Err(ZeroDim(k)); }
            if dr > dl * d { return Err(BondDimTooLarge(k)); }
            if dr != al[(k + 1) % n].dl() {
                return Err(IncompatibleBondDims(k, (k + 1) % n));
            }
        }

        // right fixed point on the bond to the right of the last site, then
        // propagated leftward through the unit cell
        let dlast = al[n - 1].dr();
        let rho_last =
            linalg::fixed_point(dlast, |x| {
                al.iter().rev()
                    .fold(x.clone(), |acc, a| a.transfer_right(a, &acc))
            });
        let mut rhos: Vec<na::DMatrix<C64>> = vec![rho_last];
        for a in al.iter().skip(1).rev() {
            let Some(last) = rhos.last() else { unreachable!() };
            let next = linalg::hermitian_part(&a.transfer_right(a, last));
            rhos.push(next);
        }
        rhos.reverse();

        let cr: Vec<na::DMatrix<C64>> =
            rhos.iter().map(linalg::herm_sqrt).collect();
        let ac: Vec<SiteTensor> =
            al.iter().zip(&cr)
            .map(|(a, c)| a.mul_right(c))
            .collect();
        let ar: Vec<SiteTensor> =
            ac.iter().enumerate()
            .map(|(k, a)| {
                let cprev = &cr[(k + n - 1) % n];
                let q = linalg::polar(cprev).adjoint() * linalg::polar(&a.rfused());
                SiteTensor::from_rfused(a.phys(), q)
            })
            .collect();
        Ok(Self { n, al, ar, ac, cr })
    }

    /// Initialize to a random state with physical dimensions `phys` and bond
    /// dimensions `bond`, where `bond[i]` is the dimension of the bond to the
    /// right of site `i`.
    ///
    /// Each left-canonical tensor is the orthonormalized (via QR) left-fused
    /// form of a matrix of complex Gaussian entries.
    ///
    /// Fails if `phys` and `bond` have different or zero lengths, any
    /// dimension is zero, or some bond dimension is too large to admit a
    /// left-isometric tensor.
    pub fn random<R>(phys: &[usize], bond: &[usize], rng: &mut R)
        -> IMPSResult<Self>
    where R: Rng + ?Sized
    {
        if phys.is_empty() { return Err(EmptyUnitCell); }
        if phys.len() != bond.len() {
            return Err(UnitCellMismatch(phys.len(), bond.len()));
        }
        let n = phys.len();
        let Ok(normal) = Normal::new(0.0, 1.0) else { unreachable!() };
        let mut al: Vec<SiteTensor> = Vec::with_capacity(n);
        for (k, (&d, &dr)) in phys.iter().zip(bond).enumerate() {
            let dl = bond[(k + n - 1) % n];
            if d == 0 || dr == 0 { return Err(ZeroDim(k)); }
            if dr > dl * d { return Err(BondDimTooLarge(k)); }
            let mat: na::DMatrix<C64> =
                na::DMatrix::from_fn(dl * d, dr, |_, _| {
                    C64::new(rng.sample(normal), rng.sample(normal))
                });
            al.push(SiteTensor::from_lfused(d, mat.qr().q()));
        }
        Self::from_al(al)
    }

    /// Like [`random`][Self::random], but for a unit cell of `n` identical
    /// sites, each with physical dimension `phys` and bond dimension `bond`.
    pub fn random_uniform<R>(n: usize, phys: usize, bond: usize, rng: &mut R)
        -> IMPSResult<Self>
    where R: Rng + ?Sized
    {
        Self::random(&vec![phys; n], &vec![bond; n], rng)
    }

    /// Return the length of the unit cell.
    pub fn len(&self) -> usize { self.n }

    /// Always returns `false`.
    pub fn is_empty(&self) -> bool { false }

    /// Return the left-canonical tensor at position `i` (taken periodically).
    pub fn al(&self, i: usize) -> &SiteTensor { &self.al[i % self.n] }

    /// Return the right-canonical tensor at position `i` (taken periodically).
    pub fn ar(&self, i: usize) -> &SiteTensor { &self.ar[i % self.n] }

    /// Return the center-gauge tensor at position `i` (taken periodically).
    pub fn ac(&self, i: usize) -> &SiteTensor { &self.ac[i % self.n] }

    /// Return the bond matrix to the right of position `i` (taken
    /// periodically).
    pub fn cr(&self, i: usize) -> &na::DMatrix<C64> { &self.cr[i % self.n] }

    /// Return the bond matrix to the left of position `i` (taken
    /// periodically).
    pub fn cl(&self, i: usize) -> &na::DMatrix<C64> {
        &self.cr[(i % self.n + self.n - 1) % self.n]
    }

    /// Return the physical dimensions of the unit cell.
    pub fn phys_dims(&self) -> Vec<usize> {
        self.al.iter().map(|a| a.phys()).collect()
    }

    /// Return the bond dimensions of the unit cell, where entry `i` is the
    /// dimension of the bond to the right of site `i`.
    pub fn bond_dims(&self) -> Vec<usize> {
        self.al.iter().map(|a| a.dr()).collect()
    }

    /// Return the right fixed point of the left transfer matrices on the bond
    /// to the right of site `i`, `CR[i] CR[i]†`.
    pub fn rho_right(&self, i: usize) -> na::DMatrix<C64> {
        let c = self.cr(i);
        c * c.adjoint()
    }

    /// Return the left fixed point of the right transfer matrices on the bond
    /// to the right of site `i`, `CR[i]† CR[i]`.
    pub fn rho_left(&self, i: usize) -> na::DMatrix<C64> {
        let c = self.cr(i);
        c.adjoint() * c
    }

    /// Return `‖Σ_s AL[i][s]† AL[i][s] − 1‖`.
    pub fn left_isometry_error(&self, i: usize) -> f64 {
        let a = self.al(i).mat();
        let id = na::DMatrix::<C64>::identity(a.ncols(), a.ncols());
        (a.adjoint() * a - id).norm()
    }

    /// Return `‖Σ_s AR[i][s] AR[i][s]† − 1‖`.
    pub fn right_isometry_error(&self, i: usize) -> f64 {
        let a = self.ar(i).rfused();
        let id = na::DMatrix::<C64>::identity(a.nrows(), a.nrows());
        (&a * a.adjoint() - id).norm()
    }

    /// Return `‖AL[i] CR[i] − CR[i − 1] AR[i]‖`, which vanishes for a state in
    /// exact mixed canonical form.
    pub fn gauge_error(&self, i: usize) -> f64 {
        let lhs = self.al(i).mul_right(self.cr(i));
        let rhs = self.ar(i).mul_left(self.cl(i));
        (lhs.into_lfused() - rhs.into_lfused()).norm()
    }
}

impl fmt::Debug for InfiniteMPS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfiniteMPS")
            .field("n", &self.n)
            .field("phys", &self.phys_dims())
            .field("bond", &self.bond_dims())
            .finish()
    }
}
