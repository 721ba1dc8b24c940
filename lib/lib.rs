#![allow(non_snake_case)]

//! Variational ground states of one-dimensional lattice Hamiltonians as
//! infinite matrix product states, found by Riemannian gradient optimization
//! on the Grassmann manifold.
//!
//! The pieces, bottom-up:
//! - [`site`]: three-leg MPS tensors stored as fused matrices
//! - [`linalg`]: regularized inverses, polar decompositions, and dense solvers
//!   for linear maps on bond operators
//! - [`grassmann`]: projection, geodesic retraction, parallel transport, and
//!   the metric for a single isometry
//! - [`imps`]: infinite MPS in mixed-canonical form
//! - [`operator`]: nearest-neighbor Hamiltonians and common models
//! - [`environments`]: infinite environments, effective Hamiltonians, and
//!   energies
//! - [`optim`]: manifold-agnostic conjugate gradient, L-BFGS, and gradient
//!   descent
//! - [`groundstate`]: the unit-cell manifold and the ground state driver
//!
//! # Example
//! ```ignore
//! use rand::thread_rng;
//! use imps_grassmann::{
//!     groundstate::{ GradientGrassmann, find_groundstate },
//!     imps::InfiniteMPS,
//!     operator::NNHamiltonian,
//! };
//!
//! let ham = NNHamiltonian::aklt();
//! let psi0 = InfiniteMPS::random_uniform(1, 3, 2, &mut thread_rng())?;
//! let (psi, envs, _) = find_groundstate(&psi0, &ham, &GradientGrassmann::default())?;
//! assert!((envs.energy_density() + 2.0 / 3.0).abs() < 1e-8);
//! ```

pub mod linalg;
pub mod site;
pub mod grassmann;
pub mod imps;
pub mod operator;
pub mod environments;
pub mod optim;
pub mod groundstate;
