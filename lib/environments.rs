//! Infinite environments and effective Hamiltonians for nearest-neighbor
//! Hamiltonians acting on an [`InfiniteMPS`].
//!
//! For a unit cell of length `L`, the left environment `L[v]` lives on the
//! bond to the left of site `v` and collects every bond term lying entirely to
//! the left of `v`, contracted with left-canonical tensors:
//!
//! ```text
//!  .--- AL --- AL --- ... --- AL ---
//!  |     |      |             |
//!  |    [   h   ]   ...       |           = L[v]
//!  |     |      |             |
//!  '--- AL*--- AL*--- ... --- AL*---
//! ```
//!
//! The right environment `R[v]` lives on the bond to the right of site `v` and
//! does the same with right-canonical tensors. Both are infinite sums; the
//! extensive part (the identity component, which grows linearly with the
//! number of terms) is projected out and the remaining geometric series is
//! summed exactly by a dense linear solve.

use nalgebra as na;
use num_complex::Complex64 as C64;
use num_traits::Zero;
use crate::{
    imps::InfiniteMPS,
    linalg,
    operator::{ HamiltonianResult, NNHamiltonian },
    site::SiteTensor,
};

/// Apply a two-site operator to two-site slices (as returned by
/// [`SiteTensor::contract_bond`]): `θ'[k] = Σ_j h[k, j] θ[j]`.
///
/// *Panics if the number of slices doesn't match the size of `h`.*
pub fn apply_bond(h: &na::DMatrix<C64>, theta: &[na::DMatrix<C64>])
    -> Vec<na::DMatrix<C64>>
{
    if h.ncols() != theta.len() { panic!("inconsistent dimensions"); }
    let (m, n) = theta[0].shape();
    h.row_iter()
        .map(|hk| {
            hk.iter().zip(theta)
                .filter(|(hkj, _)| !hkj.is_zero())
                .fold(na::DMatrix::zeros(m, n), |acc, (hkj, tj)| {
                    acc + tj * *hkj
                })
        })
        .collect()
}

/// Compute the energy of every bond term in the unit cell,
/// `e[v] = ⟨ψ| h[v] |ψ⟩` on sites `(v, v + 1)`, for the Hamiltonian held by
/// `envs`.
///
/// For Hermitian bond terms the imaginary parts vanish up to rounding.
pub fn expectation_value(state: &InfiniteMPS, envs: &Environments) -> Vec<C64> {
    bond_energies(state, envs.hamiltonian())
}

fn bond_energies(state: &InfiniteMPS, ham: &NNHamiltonian) -> Vec<C64> {
    (0..state.len())
        .map(|v| {
            let theta = state.al(v).contract_bond(state.ac(v + 1));
            let htheta = apply_bond(ham.bond(v), &theta);
            theta.iter().zip(&htheta)
                .map(|(t, ht)| t.dotc(ht))
                .sum()
        })
        .collect()
}

/// Cached environments of a state with respect to a Hamiltonian, together
/// with the Hamiltonian itself and the bond energies.
#[derive(Clone, Debug)]
pub struct Environments {
    ham: NNHamiltonian,
    // left[v] lives on the bond to the left of site v
    left: Vec<na::DMatrix<C64>>,
    // right[v] lives on the bond to the right of site v
    right: Vec<na::DMatrix<C64>>,
    energies: Vec<C64>,
}

impl Environments {
    /// Compute all environments of `state` for `ham`.
    ///
    /// Fails if the Hamiltonian cannot act on the state's unit cell.
    pub fn new(state: &InfiniteMPS, ham: &NNHamiltonian)
        -> HamiltonianResult<Self>
    {
        ham.check_unit_cell(&state.phys_dims())?;
        let left = left_environments(state, ham);
        let right = right_environments(state, ham);
        let energies = bond_energies(state, ham);
        Ok(Self { ham: ham.clone(), left, right, energies })
    }

    /// Return the Hamiltonian.
    pub fn hamiltonian(&self) -> &NNHamiltonian { &self.ham }

    /// Return the left environment on the bond to the left of site `v`.
    pub fn left(&self, v: usize) -> &na::DMatrix<C64> {
        &self.left[v % self.left.len()]
    }

    /// Return the right environment on the bond to the right of site `v`.
    pub fn right(&self, v: usize) -> &na::DMatrix<C64> {
        &self.right[v % self.right.len()]
    }

    /// Return the energy of each bond term in the unit cell.
    pub fn energies(&self) -> &[C64] { &self.energies }

    /// Return the total energy of one unit cell.
    pub fn energy(&self) -> C64 { self.energies.iter().sum() }

    /// Return the energy per site.
    pub fn energy_density(&self) -> f64 {
        self.energy().re / self.energies.len() as f64
    }
}

// X ↦ X − T(X) + tr(ρ X) 1, applied to solve for the regular part of an
// infinite geometric sum of a transfer map with fixed points (1, ρ)
fn solve_regularized<F>(
    dim: usize,
    transfer: F,
    rho: &na::DMatrix<C64>,
    y: &na::DMatrix<C64>,
) -> na::DMatrix<C64>
where F: Fn(&na::DMatrix<C64>) -> na::DMatrix<C64>
{
    let id = na::DMatrix::<C64>::identity(dim, dim);
    let a =
        linalg::dense_map(dim, |x| {
            x - transfer(x) + &id * (rho * x).trace()
        });
    let rhs = y - &id * (rho * y).trace();
    let sol = linalg::solve_dense(a, &linalg::vectorize(&rhs));
    linalg::unvectorize(&sol, dim)
}

fn left_environments(state: &InfiniteMPS, ham: &NNHamiltonian)
    -> Vec<na::DMatrix<C64>>
{
    let n = state.len();
    // contributions of bond (v − 1, v), on the bond to the right of v
    let hl: Vec<na::DMatrix<C64>> =
        (0..n)
        .map(|v| {
            let prev = state.al(v + n - 1);
            let cur = state.al(v);
            let theta = prev.contract_bond(cur);
            let htheta = apply_bond(ham.bond(v + n - 1), &theta);
            theta.iter().zip(&htheta)
                .fold(na::DMatrix::zeros(cur.dr(), cur.dr()), |acc, (t, ht)| {
                    acc + t.adjoint() * ht
                })
        })
        .collect();
    let step = |v: usize, x: &na::DMatrix<C64>| -> na::DMatrix<C64> {
        let a = state.al(v);
        a.transfer_left(a, x)
    };

    let dim = state.al(0).dl();
    let y =
        (0..n).fold(na::DMatrix::zeros(dim, dim), |acc, v| step(v, &acc) + &hl[v]);
    let transfer =
        |x: &na::DMatrix<C64>| (0..n).fold(x.clone(), |acc, v| step(v, &acc));
    let l0 = solve_regularized(dim, transfer, &state.rho_right(n - 1), &y);

    let mut left: Vec<na::DMatrix<C64>> = Vec::with_capacity(n);
    left.push(l0);
    for v in 0..n - 1 {
        let next = step(v, &left[v]) + &hl[v];
        left.push(next);
    }
    left
}

fn right_environments(state: &InfiniteMPS, ham: &NNHamiltonian)
    -> Vec<na::DMatrix<C64>>
{
    let n = state.len();
    // contributions of bond (v, v + 1), on the bond to the left of v
    let hr: Vec<na::DMatrix<C64>> =
        (0..n)
        .map(|v| {
            let cur = state.ar(v);
            let next = state.ar(v + 1);
            let theta = cur.contract_bond(next);
            let htheta = apply_bond(ham.bond(v), &theta);
            theta.iter().zip(&htheta)
                .fold(na::DMatrix::zeros(cur.dl(), cur.dl()), |acc, (t, ht)| {
                    acc + ht * t.adjoint()
                })
        })
        .collect();
    let step = |v: usize, x: &na::DMatrix<C64>| -> na::DMatrix<C64> {
        let a = state.ar(v);
        a.transfer_right(a, x)
    };

    let dim = state.al(n - 1).dr();
    let y =
        (0..n).rev()
        .fold(na::DMatrix::zeros(dim, dim), |acc, v| step(v, &acc) + &hr[v]);
    let transfer =
        |x: &na::DMatrix<C64>| (0..n).rev().fold(x.clone(), |acc, v| step(v, &acc));
    let rlast = solve_regularized(dim, transfer, &state.rho_left(n - 1), &y);

    // built from the last site backward
    let mut right: Vec<na::DMatrix<C64>> = Vec::with_capacity(n);
    right.push(rlast);
    for v in (1..n).rev() {
        let Some(prev) = right.last() else { unreachable!() };
        let next = step(v, prev) + &hr[v];
        right.push(next);
    }
    right.reverse();
    right
}

/// Apply the one-site effective Hamiltonian at position `v` to a tensor `x`
/// with the same shape as `AC[v]`.
///
/// The result is the derivative of `⟨x|H|x⟩` (with all other tensors of the
/// state held fixed and the extensive part of the energy removed) with respect
/// to the conjugate of `x`:
///
/// ```text
///  .-- L --- x ---.     .--- x --- R --.
///  |         |    |  +  |    |         |  +  (bond v, v + 1)  +  (bond v − 1, v)
///  '--     ( s )  '     '  ( s )     --'
/// ```
pub fn ac_prime(
    x: &SiteTensor,
    v: usize,
    state: &InfiniteMPS,
    envs: &Environments,
) -> SiteTensor
{
    let n = state.len();
    let ham = envs.hamiltonian();
    let lenv = envs.left(v);
    let renv = envs.right(v);
    let mut out: Vec<na::DMatrix<C64>> =
        x.slices().map(|xs| lenv * xs + xs * renv).collect();

    // bond (v, v + 1), closed with AR on the right
    let next = state.ar(v + 1);
    let theta = x.contract_bond(next);
    let htheta = apply_bond(ham.bond(v), &theta);
    let dn = next.phys();
    out.iter_mut().enumerate()
        .for_each(|(s, outs)| {
            next.slices().enumerate()
                .for_each(|(t, b)| { *outs += &htheta[s * dn + t] * b.adjoint(); });
        });

    // bond (v − 1, v), closed with AL on the left
    let prev = state.al(v + n - 1);
    let theta = prev.contract_bond(x);
    let htheta = apply_bond(ham.bond(v + n - 1), &theta);
    let d = x.phys();
    out.iter_mut().enumerate()
        .for_each(|(s, outs)| {
            prev.slices().enumerate()
                .for_each(|(r, a)| { *outs += a.adjoint() * &htheta[r * d + s]; });
        });

    SiteTensor::from_slices(&out)
}
