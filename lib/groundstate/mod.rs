//! Variational ground state search over infinite MPS by Riemannian
//! optimization on the Grassmann manifold.
//!
//! Every left-canonical tensor `AL[i]` of the unit cell, read as a left-fused
//! isometry, is a point on a Grassmann manifold. Energy gradients are
//! projected onto the manifold's tangent spaces, preconditioned with the
//! metric induced by the bond matrices, and handed to one of the optimizers
//! in [`optim`][crate::optim] (conjugate gradient by default), which moves
//! along geodesics and carries search directions with parallel transport.
//!
//! # Example
//! ```ignore
//! use rand::thread_rng;
//! use imps_grassmann::{
//!     groundstate::{ GradientGrassmann, Family, Method, find_groundstate },
//!     imps::InfiniteMPS,
//!     operator::NNHamiltonian,
//! };
//!
//! let ham = NNHamiltonian::transverse_field_ising(1.0, 1.5);
//! let psi0 = InfiniteMPS::random_uniform(1, 2, 8, &mut thread_rng())?;
//! let alg = GradientGrassmann::new(Method::Family(Family::LBFGS), 1e-10, 500, 1)?;
//! let (psi, envs, gradnorm) = find_groundstate(&psi0, &ham, &alg)?;
//! println!("e = {} (‖∇e‖ = {:e})", envs.energy_density(), gradnorm);
//! ```

use std::{ fmt, str::FromStr, sync::Arc };
use log::debug;
use thiserror::Error;
use crate::{
    environments::Environments,
    imps::{ IMPSError, InfiniteMPS },
    operator::{ HamiltonianError, NNHamiltonian },
    optim::{
        Algorithm,
        ConjugateGradient,
        GradientDescent,
        LBFGS,
        Optimizer,
    },
};

pub mod manifold;
use manifold::{ FinalizeFn, GrassmannPoint, GrassmannProblem, GrassmannVector };

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Returned when an optimization method is named by an unrecognized
    /// string.
    #[error("error in optimizer configuration: unknown method {0:?} (expected one of \"cg\", \"conjugategradient\", \"lbfgs\", \"gd\", \"gradientdescent\")")]
    UnknownMethod(String),

    /// Returned when the gradient tolerance is not a positive, finite number.
    #[error("error in optimizer configuration: invalid tolerance {0}")]
    InvalidTolerance(f64),
}
use ConfigError::*;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum GroundStateError {
    #[error("state error: {0}")]
    StateError(#[from] IMPSError),

    #[error("Hamiltonian error: {0}")]
    HamiltonianError(#[from] HamiltonianError),
}
pub type GroundStateResult<T> = Result<T, GroundStateError>;

/// A family of optimization algorithms, to be configured from a tolerance,
/// iteration budget, and verbosity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Family {
    ConjugateGradient,
    LBFGS,
    GradientDescent,
}

impl Family {
    /// Construct an optimizer of this family.
    pub fn build(self, tol: f64, maxiter: usize, verbosity: usize) -> Algorithm {
        match self {
            Self::ConjugateGradient =>
                ConjugateGradient::new(tol, maxiter, verbosity).into(),
            Self::LBFGS =>
                LBFGS::new(tol, maxiter, verbosity).into(),
            Self::GradientDescent =>
                GradientDescent::new(tol, maxiter, verbosity).into(),
        }
    }
}

impl FromStr for Family {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "cg" | "conjugategradient" => Ok(Self::ConjugateGradient),
            "lbfgs" => Ok(Self::LBFGS),
            "gd" | "gradientdescent" => Ok(Self::GradientDescent),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConjugateGradient => write!(f, "cg"),
            Self::LBFGS => write!(f, "lbfgs"),
            Self::GradientDescent => write!(f, "gd"),
        }
    }
}

/// Either a fully configured optimizer or an algorithm family.
#[derive(Clone, Debug, PartialEq)]
pub enum Method {
    /// Used as-is; tolerance, iteration budget, and verbosity passed alongside
    /// it are ignored.
    Instance(Algorithm),
    /// Configured from the accompanying tolerance, iteration budget, and
    /// verbosity.
    Family(Family),
}

impl From<Algorithm> for Method {
    fn from(alg: Algorithm) -> Self { Self::Instance(alg) }
}

impl From<Family> for Method {
    fn from(family: Family) -> Self { Self::Family(family) }
}

impl FromStr for Method {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> { s.parse().map(Self::Family) }
}

/// Ground state search by Riemannian gradient optimization.
#[derive(Clone)]
pub struct GradientGrassmann {
    method: Algorithm,
    finalize: Option<Arc<FinalizeFn>>,
}

impl fmt::Debug for GradientGrassmann {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GradientGrassmann")
            .field("method", &self.method)
            .field("finalize", &self.finalize.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Default for GradientGrassmann {
    fn default() -> Self {
        Self {
            method: Family::ConjugateGradient.build(1e-12, 100, 2),
            finalize: None,
        }
    }
}

impl GradientGrassmann {
    /// Create a new ground state search.
    ///
    /// Fails if `method` is a [`Method::Family`] and `tol` is not positive and
    /// finite.
    pub fn new<M>(method: M, tol: f64, maxiter: usize, verbosity: usize)
        -> ConfigResult<Self>
    where M: Into<Method>
    {
        let method =
            match method.into() {
                Method::Instance(alg) => alg,
                Method::Family(family) => {
                    if !(tol.is_finite() && tol > 0.0) {
                        return Err(InvalidTolerance(tol));
                    }
                    family.build(tol, maxiter, verbosity)
                },
            };
        Ok(Self { method, finalize: None })
    }

    /// Like [`new`][Self::new], but naming the algorithm family by a string
    /// (see [`Family`]'s [`FromStr`] implementation).
    pub fn from_name(name: &str, tol: f64, maxiter: usize, verbosity: usize)
        -> ConfigResult<Self>
    {
        let family: Family = name.parse()?;
        Self::new(family, tol, maxiter, verbosity)
    }

    /// Set a hook called on every accepted iterate with the current state and
    /// environments, energy, gradient, and iteration number. Whatever it
    /// returns replaces the iterate.
    pub fn with_finalize<F>(mut self, finalize: F) -> Self
    where
        F: Fn(GrassmannPoint, f64, GrassmannVector, usize)
            -> (GrassmannPoint, f64, GrassmannVector)
            + Send + Sync + 'static
    {
        self.finalize = Some(Arc::new(finalize));
        self
    }

    /// Return the configured optimizer.
    pub fn method(&self) -> &Algorithm { &self.method }
}

/// Minimize the energy of `state` with respect to `ham`.
///
/// Returns the optimized state, its environments, and the norm of the final
/// gradient. Failing to reach the requested tolerance is not an error; check
/// the returned gradient norm.
///
/// Fails if `ham` is incompatible with the state's unit cell.
pub fn find_groundstate(
    state: &InfiniteMPS,
    ham: &NNHamiltonian,
    alg: &GradientGrassmann,
) -> GroundStateResult<(InfiniteMPS, Environments, f64)>
{
    let envs = Environments::new(state, ham)?;
    let problem =
        match alg.finalize.as_deref() {
            Some(fin) => GrassmannProblem::new(ham).with_finalize(fin),
            None => GrassmannProblem::new(ham),
        };
    debug!(
        "find_groundstate: {} on a unit cell of {} sites with bond dimensions {:?}",
        alg.method.name(), state.len(), state.bond_dims(),
    );
    let res = alg.method.optimize(&problem, (state.clone(), envs));
    let gradnorm = res.gradnorm();
    let (state, envs) = res.x;
    Ok((state, envs, gradnorm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{ SeedableRng, rngs::StdRng };
    use std::sync::{ Mutex, atomic::{ AtomicUsize, Ordering } };

    #[test]
    fn family_names() {
        assert_eq!("cg".parse::<Family>().unwrap(), Family::ConjugateGradient);
        assert_eq!("ConjugateGradient".parse::<Family>().unwrap(), Family::ConjugateGradient);
        assert_eq!("LBFGS".parse::<Family>().unwrap(), Family::LBFGS);
        assert_eq!("gd".parse::<Family>().unwrap(), Family::GradientDescent);
        assert_eq!(" GradientDescent ".parse::<Family>().unwrap(), Family::GradientDescent);
        for bad in ["", "newton", "c g", "bfgs"] {
            match bad.parse::<Family>() {
                Err(UnknownMethod(name)) => assert_eq!(name, bad),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn method_names() {
        assert_eq!("lbfgs".parse::<Method>().unwrap(), Method::Family(Family::LBFGS));
        assert!(matches!("bfgs".parse::<Method>(), Err(UnknownMethod(_))));
        let method: Method = "cg".parse().unwrap();
        let alg = GradientGrassmann::new(method, 1e-6, 10, 0).unwrap();
        assert_eq!(alg.method(), &Algorithm::from(ConjugateGradient::new(1e-6, 10, 0)));
    }

    #[test]
    fn construction() {
        let alg = GradientGrassmann::new(Family::LBFGS, 1e-6, 10, 0).unwrap();
        assert_eq!(alg.method(), &Algorithm::from(LBFGS::new(1e-6, 10, 0)));

        // instances ignore the other arguments
        let cg: Algorithm = ConjugateGradient::new(1e-3, 7, 0).into();
        let alg = GradientGrassmann::new(cg.clone(), f64::NAN, 0, 3).unwrap();
        assert_eq!(alg.method(), &cg);

        assert!(matches!(
            GradientGrassmann::new(Family::GradientDescent, 0.0, 10, 0),
            Err(InvalidTolerance(_)),
        ));
        assert!(matches!(
            GradientGrassmann::new(Family::ConjugateGradient, f64::INFINITY, 10, 0),
            Err(InvalidTolerance(_)),
        ));
        assert!(matches!(
            GradientGrassmann::from_name("simplex", 1e-8, 10, 0),
            Err(UnknownMethod(_)),
        ));
        assert!(GradientGrassmann::from_name("gd", 1e-8, 10, 0).is_ok());

        let default = GradientGrassmann::default();
        assert_eq!(default.method(), &Algorithm::from(ConjugateGradient::new(1e-12, 100, 2)));
    }

    #[test]
    fn incompatible_hamiltonian_is_rejected() {
        let mut rng = StdRng::seed_from_u64(10);
        let psi = InfiniteMPS::random_uniform(1, 2, 2, &mut rng).unwrap();
        let ham = NNHamiltonian::aklt();
        let alg = GradientGrassmann::default();
        assert!(matches!(
            find_groundstate(&psi, &ham, &alg),
            Err(GroundStateError::HamiltonianError(_)),
        ));
    }

    #[test]
    fn finalize_is_called_every_iteration() {
        let mut rng = StdRng::seed_from_u64(11);
        let psi = InfiniteMPS::random_uniform(1, 2, 2, &mut rng).unwrap();
        let ham = NNHamiltonian::transverse_field_ising(1.0, 1.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let iters = Arc::new(Mutex::new(Vec::<usize>::new()));
        let (c, i) = (Arc::clone(&calls), Arc::clone(&iters));
        let alg =
            GradientGrassmann::new(Family::ConjugateGradient, 1e-14, 5, 0)
            .unwrap()
            .with_finalize(move |x, f, g, iter| {
                c.fetch_add(1, Ordering::SeqCst);
                i.lock().unwrap().push(iter);
                (x, f, g)
            });
        let (_, envs, gradnorm) = find_groundstate(&psi, &ham, &alg).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(*iters.lock().unwrap(), vec![1, 2, 3, 4, 5]);
        assert!(gradnorm.is_finite());
        assert_abs_diff_eq!(envs.energy().im, 0.0, epsilon = 1e-12);
    }
}
