//! Three-leg MPS site tensors stored as fused matrices.
//!
//! A site tensor `A` carries a left bond index `u` (dimension `Dl`), a physical
//! index `s` (dimension `d`), and a right bond index `v` (dimension `Dr`):
//!
//! ```text
//!  u --- A --- v
//!        |
//!        s
//! ```
//!
//! `nalgebra` matrices are column-major, so the tensor is kept in "left-fused"
//! form, as a `(Dl·d) × Dr` matrix whose row index is `u + Dl·s`. In this
//! layout the physical slice `A[s]` is the contiguous block of rows
//! `s·Dl .. (s + 1)·Dl`, and the same buffer read as a `Dl × (d·Dr)` matrix
//! (column index `s + d·v`) is the "right-fused" form, so switching between
//! the two is a no-copy reshape.
//!
//! Left isometries (`AL`) satisfy `Σ_s A[s]† A[s] = 1`, i.e. the left-fused
//! matrix has orthonormal columns; right isometries (`AR`) satisfy
//! `Σ_s A[s] A[s]† = 1`, i.e. the right-fused matrix has orthonormal rows.

use std::fmt;
use itertools::Itertools;
use nalgebra as na;
use num_complex::Complex64 as C64;
use num_traits::Zero;

/// A single MPS tensor in left-fused matrix form.
#[derive(Clone, Debug, PartialEq)]
pub struct SiteTensor {
    phys: usize,
    mat: na::DMatrix<C64>,
}

impl SiteTensor {
    /// Create a new site tensor from a left-fused matrix with physical
    /// dimension `phys`.
    ///
    /// *Panics if `phys` is zero or does not evenly divide the number of rows
    /// in `mat`.*
    pub fn from_lfused(phys: usize, mat: na::DMatrix<C64>) -> Self {
        if phys == 0 || mat.nrows() % phys != 0 {
            panic!("inconsistent dimensions");
        }
        Self { phys, mat }
    }

    /// Create a new site tensor from a right-fused `Dl × (d·Dr)` matrix.
    ///
    /// *Panics if `phys` is zero or does not evenly divide the number of
    /// columns in `mat`.*
    pub fn from_rfused(phys: usize, mat: na::DMatrix<C64>) -> Self {
        if phys == 0 || mat.ncols() % phys != 0 {
            panic!("inconsistent dimensions");
        }
        let (m, sn) = mat.shape();
        let mat = mat.reshape_generic(na::Dyn(m * phys), na::Dyn(sn / phys));
        Self { phys, mat }
    }

    /// Create a new site tensor from its physical slices `A[s]`, each of shape
    /// `Dl × Dr`.
    ///
    /// *Panics if `slices` is empty or the slices have differing shapes.*
    pub fn from_slices(slices: &[na::DMatrix<C64>]) -> Self {
        let Some(first) = slices.first() else { panic!("inconsistent dimensions") };
        let (m, n) = first.shape();
        if slices.iter().any(|a| a.shape() != (m, n)) {
            panic!("inconsistent dimensions");
        }
        let phys = slices.len();
        let mut mat: na::DMatrix<C64> = na::DMatrix::zeros(m * phys, n);
        slices.iter().enumerate()
            .for_each(|(s, a)| { mat.rows_mut(s * m, m).copy_from(a); });
        Self { phys, mat }
    }

    /// Create a zero tensor with the given dimensions.
    pub fn zeros(dl: usize, phys: usize, dr: usize) -> Self {
        Self::from_lfused(phys, na::DMatrix::zeros(dl * phys, dr))
    }

    /// Return the dimensions `(Dl, d, Dr)`.
    pub fn dims(&self) -> (usize, usize, usize) {
        let (ms, n) = self.mat.shape();
        (ms / self.phys, self.phys, n)
    }

    /// Return the physical dimension.
    pub fn phys(&self) -> usize { self.phys }

    /// Return the left bond dimension.
    pub fn dl(&self) -> usize { self.mat.nrows() / self.phys }

    /// Return the right bond dimension.
    pub fn dr(&self) -> usize { self.mat.ncols() }

    /// Return a reference to the left-fused matrix.
    pub fn mat(&self) -> &na::DMatrix<C64> { &self.mat }

    /// Discard the tensor structure and return the left-fused matrix.
    pub fn into_lfused(self) -> na::DMatrix<C64> { self.mat }

    /// Return the tensor as a right-fused `Dl × (d·Dr)` matrix.
    pub fn rfused(&self) -> na::DMatrix<C64> {
        let (m, s, n) = self.dims();
        self.mat.clone().reshape_generic(na::Dyn(m), na::Dyn(s * n))
    }

    /// Return the physical slice `A[s]` as a `Dl × Dr` view.
    pub fn slice(&self, s: usize) -> na::DMatrixView<'_, C64> {
        let m = self.dl();
        self.mat.rows(s * m, m)
    }

    /// Iterate over all physical slices.
    pub fn slices(&self) -> impl Iterator<Item = na::DMatrixView<'_, C64>> + '_
    {
        (0..self.phys).map(|s| self.slice(s))
    }

    /// Multiply each physical slice on the left by `lhs`, giving
    /// `A'[s] = lhs · A[s]`.
    pub fn mul_left(&self, lhs: &na::DMatrix<C64>) -> Self {
        let slices: Vec<na::DMatrix<C64>> =
            self.slices().map(|a| lhs * a).collect();
        Self::from_slices(&slices)
    }

    /// Multiply on the right by `rhs`, giving `A'[s] = A[s] · rhs`.
    pub fn mul_right(&self, rhs: &na::DMatrix<C64>) -> Self {
        Self { phys: self.phys, mat: &self.mat * rhs }
    }

    /// Contract with another site tensor on the shared bond, returning the
    /// two-site slices `θ[s·d' + t] = A[s] · B[t]`.
    ///
    /// *Panics if the bond dimensions don't match.*
    pub fn contract_bond(&self, rhs: &Self) -> Vec<na::DMatrix<C64>> {
        if self.dr() != rhs.dl() { panic!("inconsistent dimensions"); }
        self.slices().cartesian_product(rhs.slices().collect::<Vec<_>>())
            .map(|(a, b)| a * b)
            .collect()
    }

    /// Apply the left transfer map of `bra` and `self` to an operator on the
    /// left bond: `x ↦ Σ_s bra[s]† x self[s]`.
    pub fn transfer_left(&self, bra: &Self, x: &na::DMatrix<C64>)
        -> na::DMatrix<C64>
    {
        self.slices().zip(bra.slices())
            .fold(na::DMatrix::zeros(bra.dr(), self.dr()), |acc, (a, b)| {
                acc + b.adjoint() * x * a
            })
    }

    /// Apply the right transfer map of `self` and `bra` to an operator on the
    /// right bond: `x ↦ Σ_s self[s] x bra[s]†`.
    pub fn transfer_right(&self, bra: &Self, x: &na::DMatrix<C64>)
        -> na::DMatrix<C64>
    {
        self.slices().zip(bra.slices())
            .fold(na::DMatrix::zeros(self.dl(), bra.dl()), |acc, (a, b)| {
                acc + a * x * b.adjoint()
            })
    }

    /// Return the Frobenius inner product `⟨self|rhs⟩ = tr(self† rhs)`.
    pub fn dotc(&self, rhs: &Self) -> C64 { self.mat.dotc(&rhs.mat) }

    /// Return the Frobenius norm.
    pub fn norm(&self) -> f64 { self.mat.norm() }

    /// Return `true` if every element is zero.
    pub fn is_zero(&self) -> bool { self.mat.iter().all(|a| a.is_zero()) }
}

impl std::ops::Add<&SiteTensor> for SiteTensor {
    type Output = SiteTensor;

    fn add(mut self, rhs: &SiteTensor) -> SiteTensor {
        if self.dims() != rhs.dims() { panic!("inconsistent dimensions"); }
        self.mat += &rhs.mat;
        self
    }
}

impl fmt::Display for SiteTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (m, s, n) = self.dims();
        writeln!(f, "{{ {}, {}, {} }}", m, s, n)?;
        for (k, a) in self.slices().enumerate() {
            match f.precision() {
                Some(prec) => write!(f, "s={}{:.*}", k, prec, a)?,
                None => write!(f, "s={}{}", k, a)?,
            }
        }
        Ok(())
    }
}
