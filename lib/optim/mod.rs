//! First-order optimization on Riemannian manifolds.
//!
//! Optimizers here never look inside the points and tangent vectors they work
//! with. Everything they need (objective and gradient, retraction, transport,
//! the metric, tangent arithmetic, preconditioning) is supplied by a type
//! implementing [`Problem`].
//!
//! Three algorithms are provided, all sharing the same Wolfe-type
//! [`LineSearch`]:
//! - [`ConjugateGradient`], with Hager-Zhang or Polak-Ribière+ updates
//! - [`LBFGS`], limited-memory quasi-Newton with transported history
//! - [`GradientDescent`]
//!
//! Verbosity levels follow a common convention: `0` is silent, `1` warns on
//! non-convergence, `2` logs every iteration at `info` level, and `3` and above
//! add line search details at `debug` level.

use log::{ info, warn };

pub mod linesearch;
pub mod cg;
pub mod lbfgs;
pub mod gd;

pub use linesearch::{ LineSearch, LineSearchStep };
pub use cg::{ ConjugateGradient, CGFlavor };
pub use lbfgs::LBFGS;
pub use gd::GradientDescent;

/// Callbacks describing an optimization problem on a manifold.
///
/// Tangent vectors returned by [`fg`][Self::fg] must be Riemannian gradients,
/// so that `inner(x, g, d)` is the directional derivative along `d`.
pub trait Problem {
    /// A point on the manifold.
    type Point: Clone;
    /// A tangent vector at some point.
    type Tangent: Clone;

    /// Compute the objective function and its gradient at `x`.
    fn fg(&self, x: &Self::Point) -> (f64, Self::Tangent);

    /// Move from `x` along `d` by step length `alpha`, returning the new point
    /// and the velocity of the curve `alpha ↦ x(alpha)` at the new point.
    fn retract(&self, x: &Self::Point, d: &Self::Tangent, alpha: f64)
        -> (Self::Point, Self::Tangent);

    /// Transport the tangent `h` at `x` to the point `xp` reached by
    /// retracting along `d` by `alpha`.
    fn transport(
        &self,
        h: &Self::Tangent,
        x: &Self::Point,
        d: &Self::Tangent,
        alpha: f64,
        xp: &Self::Point,
    ) -> Self::Tangent;

    /// Inner product of two tangents at `x`.
    fn inner(&self, x: &Self::Point, a: &Self::Tangent, b: &Self::Tangent)
        -> f64;

    /// Multiply a tangent by a real scalar.
    fn scale(&self, a: Self::Tangent, c: f64) -> Self::Tangent;

    /// Return `a + c · b`.
    fn add(&self, a: Self::Tangent, b: &Self::Tangent, c: f64) -> Self::Tangent;

    /// Apply a preconditioner to the gradient `g` at `x`.
    ///
    /// Defaults to the identity.
    fn precondition(&self, _x: &Self::Point, g: Self::Tangent) -> Self::Tangent {
        g
    }

    /// Hook called once after every accepted step.
    ///
    /// Defaults to the identity.
    fn finalize(&self, x: Self::Point, f: f64, g: Self::Tangent, _iter: usize)
        -> (Self::Point, f64, Self::Tangent)
    {
        (x, f, g)
    }
}

/// Output of an optimization run.
#[derive(Clone, Debug)]
pub struct OptimResult<X, G> {
    /// Final point.
    pub x: X,
    /// Objective function at the final point.
    pub f: f64,
    /// Gradient at the final point.
    pub g: G,
    /// Number of objective/gradient evaluations.
    pub numfg: usize,
    /// Number of iterations performed.
    pub numiter: usize,
    /// Whether the gradient norm reached the requested tolerance.
    pub converged: bool,
    /// Objective function and gradient norm for the initial point and after
    /// every iteration.
    pub history: Vec<(f64, f64)>,
}

impl<X, G> OptimResult<X, G> {
    /// Return the gradient norm at the final point.
    pub fn gradnorm(&self) -> f64 {
        self.history.last().map(|(_, gn)| *gn).unwrap_or(f64::NAN)
    }
}

/// A first-order optimization algorithm.
pub trait Optimizer {
    /// Minimize the objective of `problem`, starting from `x0`.
    fn optimize<P>(&self, problem: &P, x0: P::Point)
        -> OptimResult<P::Point, P::Tangent>
    where P: Problem;
}

/// One of the optimization algorithms in this module.
#[derive(Clone, Debug, PartialEq)]
pub enum Algorithm {
    ConjugateGradient(ConjugateGradient),
    LBFGS(LBFGS),
    GradientDescent(GradientDescent),
}

impl Algorithm {
    /// Return the name of the algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConjugateGradient(_) => "ConjugateGradient",
            Self::LBFGS(_) => "LBFGS",
            Self::GradientDescent(_) => "GradientDescent",
        }
    }
}

impl From<ConjugateGradient> for Algorithm {
    fn from(alg: ConjugateGradient) -> Self { Self::ConjugateGradient(alg) }
}

impl From<LBFGS> for Algorithm {
    fn from(alg: LBFGS) -> Self { Self::LBFGS(alg) }
}

impl From<GradientDescent> for Algorithm {
    fn from(alg: GradientDescent) -> Self { Self::GradientDescent(alg) }
}

impl Optimizer for Algorithm {
    fn optimize<P>(&self, problem: &P, x0: P::Point)
        -> OptimResult<P::Point, P::Tangent>
    where P: Problem
    {
        match self {
            Self::ConjugateGradient(alg) => alg.optimize(problem, x0),
            Self::LBFGS(alg) => alg.optimize(problem, x0),
            Self::GradientDescent(alg) => alg.optimize(problem, x0),
        }
    }
}

// shared stopping/logging logic

fn gradnorm<P>(problem: &P, x: &P::Point, g: &P::Tangent) -> f64
where P: Problem
{
    problem.inner(x, g, g).max(0.0).sqrt()
}

fn log_start(name: &str, verbosity: usize, f: f64, gnorm: f64) {
    if verbosity >= 2 {
        info!("{}: initializing with f = {:.12e}, ‖∇f‖ = {:.4e}", name, f, gnorm);
    }
}

fn log_iter(
    name: &str,
    verbosity: usize,
    iter: usize,
    f: f64,
    gnorm: f64,
    alpha: f64,
    numfg: usize,
) {
    if verbosity >= 2 {
        info!(
            "{}: iter {:4}: f = {:.12e}, ‖∇f‖ = {:.4e}, α = {:.2e}, nfg = {}",
            name, iter, f, gnorm, alpha, numfg,
        );
    }
}

fn log_rejected(
    name: &str,
    verbosity: usize,
    iter: usize,
    f: f64,
    f_step: f64,
    restart: bool,
) {
    if verbosity >= 1 {
        warn!(
            "{}: iter {:4}: line search failed with f = {:.12e} > {:.12e}; {}",
            name, iter, f_step, f,
            if restart { "restarting along the preconditioned gradient" } else { "stopping" },
        );
    }
}

fn log_end(
    name: &str,
    verbosity: usize,
    converged: bool,
    iter: usize,
    f: f64,
    gnorm: f64,
    numfg: usize,
) {
    if converged {
        if verbosity >= 2 {
            info!(
                "{}: converged after {} iterations: f = {:.12e}, ‖∇f‖ = {:.4e}, nfg = {}",
                name, iter, f, gnorm, numfg,
            );
        }
    } else if verbosity >= 1 {
        warn!(
            "{}: not converged after {} iterations: f = {:.12e}, ‖∇f‖ = {:.4e}, nfg = {}",
            name, iter, f, gnorm, numfg,
        );
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::testing::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn algorithm_dispatch() {
        let problem = Quadratic::new(8);
        let x0 = nalgebra::DVector::zeros(8);
        let algs: Vec<Algorithm> = vec![
            ConjugateGradient::new(1e-10, 200, 0).into(),
            LBFGS::new(1e-10, 200, 0).into(),
            GradientDescent::new(1e-10, 2000, 0).into(),
        ];
        let xstar = problem.solution();
        for alg in algs {
            let res = alg.optimize(&problem, x0.clone());
            assert!(res.converged, "{} did not converge", alg.name());
            assert_abs_diff_eq!((&res.x - &xstar).norm(), 0.0, epsilon = 1e-8);
            assert_eq!(res.history.len(), res.numiter + 1);
            assert!(res.gradnorm() <= 1e-10);
        }
    }

    #[test]
    fn failed_line_search_keeps_point() {
        // a single trial at α = 1 overshoots to f = 7 from f = 0
        let problem = Quadratic::new(4);
        let x0 = nalgebra::DVector::zeros(4);
        let ls = LineSearch::default().with_maxfg(1);
        let algs: Vec<Algorithm> = vec![
            ConjugateGradient::new(1e-10, 20, 0).with_linesearch(ls).into(),
            LBFGS::new(1e-10, 20, 0).with_linesearch(ls).into(),
            GradientDescent::new(1e-10, 20, 0).with_linesearch(ls).into(),
        ];
        for alg in algs {
            let res = alg.optimize(&problem, x0.clone());
            assert!(!res.converged);
            assert_eq!(res.numiter, 1, "{}", alg.name());
            assert_eq!(res.x, x0);
            assert_eq!(res.f, 0.0);
            assert_eq!(res.history.len(), res.numiter + 1);
            assert!(res.history.windows(2).all(|w| w[1].0 <= w[0].0));
        }
    }
}
