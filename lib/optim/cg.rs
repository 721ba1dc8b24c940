//! Nonlinear conjugate gradient.

use log::debug;
use super::{
    LineSearch,
    OptimResult,
    Optimizer,
    Problem,
    gradnorm,
    log_end,
    log_iter,
    log_rejected,
    log_start,
};

/// Update rule for the conjugation parameter β.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CGFlavor {
    /// Hager-Zhang, with the lower bound
    /// `η = −1 / (‖d‖ min(0.01, ‖g‖))`.
    HagerZhang,
    /// Polak-Ribière, clipped at zero.
    PolakRibierePlus,
}

/// Nonlinear conjugate gradient with preconditioning.
#[derive(Clone, Debug, PartialEq)]
pub struct ConjugateGradient {
    pub flavor: CGFlavor,
    pub gradtol: f64,
    pub maxiter: usize,
    pub verbosity: usize,
    pub linesearch: LineSearch,
}

impl Default for ConjugateGradient {
    fn default() -> Self { Self::new(1e-8, 100, 1) }
}

impl ConjugateGradient {
    /// Create a new Hager-Zhang conjugate gradient optimizer.
    ///
    /// The line search uses a curvature parameter `c₂ = 0.1`; search
    /// directions lose conjugacy under looser line searches.
    pub fn new(gradtol: f64, maxiter: usize, verbosity: usize) -> Self {
        Self {
            flavor: CGFlavor::HagerZhang,
            gradtol,
            maxiter,
            verbosity,
            linesearch: LineSearch::default().with_wolfe(1e-4, 0.1),
        }
    }

    /// Set the update rule for β.
    pub fn with_flavor(mut self, flavor: CGFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Set the line search.
    pub fn with_linesearch(mut self, linesearch: LineSearch) -> Self {
        self.linesearch = linesearch;
        self
    }

    #[allow(clippy::too_many_arguments)]
    fn beta<P>(
        &self,
        problem: &P,
        x: &P::Point,
        g: &P::Tangent,
        pg: &P::Tangent,
        g_old: &P::Tangent,
        pg_old: &P::Tangent,
        d: &P::Tangent,
        gnorm_old: f64,
    ) -> f64
    where P: Problem
    {
        let y = problem.add(g.clone(), g_old, -1.0);
        match self.flavor {
            CGFlavor::HagerZhang => {
                let py = problem.add(pg.clone(), pg_old, -1.0);
                let dy = problem.inner(x, d, &y);
                if !(dy > 0.0) || !dy.is_finite() { return 0.0; }
                let ypg = problem.inner(x, &y, pg);
                let ypy = problem.inner(x, &y, &py);
                let dg = problem.inner(x, d, g);
                let beta = (ypg - 2.0 * ypy * dg / dy) / dy;
                let dnorm = problem.inner(x, d, d).sqrt();
                let eta = -1.0 / (dnorm * gnorm_old.min(0.01));
                if beta.is_finite() { beta.max(eta) } else { 0.0 }
            },
            CGFlavor::PolakRibierePlus => {
                // g_old and pg_old have been transported, which preserves
                // their inner product up to rounding
                let gpg_old = problem.inner(x, g_old, pg_old);
                if !(gpg_old > 0.0) { return 0.0; }
                let beta = problem.inner(x, &y, pg) / gpg_old;
                if beta.is_finite() { beta.max(0.0) } else { 0.0 }
            },
        }
    }
}

impl Optimizer for ConjugateGradient {
    fn optimize<P>(&self, problem: &P, x0: P::Point)
        -> OptimResult<P::Point, P::Tangent>
    where P: Problem
    {
        const NAME: &str = "CG";
        let mut x = x0;
        let (mut f, mut g) = problem.fg(&x);
        let mut numfg: usize = 1;
        let mut gnorm = gradnorm(problem, &x, &g);
        let mut history: Vec<(f64, f64)> = vec![(f, gnorm)];
        log_start(NAME, self.verbosity, f, gnorm);

        let mut pg = problem.precondition(&x, g.clone());
        let mut d = problem.scale(pg.clone(), -1.0);
        let mut steepest = true;
        let mut alpha: f64 = 1.0;
        let mut iter: usize = 0;
        let converged =
            loop {
                if gnorm <= self.gradtol { break true; }
                if iter >= self.maxiter { break false; }
                iter += 1;

                let step =
                    self.linesearch.search(
                        problem, &x, f, &g, &d, alpha, self.verbosity);
                numfg += step.numfg;
                if step.is_rejected(f) {
                    log_rejected(NAME, self.verbosity, iter, f, step.f, !steepest);
                    history.push((f, gnorm));
                    if steepest { break false; }
                    d = problem.scale(pg.clone(), -1.0);
                    steepest = true;
                    continue;
                }
                alpha = step.alpha;
                let (xn, fn_, gn) = problem.finalize(step.x, step.f, step.g, iter);

                let g_old = problem.transport(&g, &x, &d, alpha, &xn);
                let pg_old = problem.transport(&pg, &x, &d, alpha, &xn);
                let d_old = step.d;
                let gnorm_old = gnorm;
                x = xn;
                f = fn_;
                g = gn;
                gnorm = gradnorm(problem, &x, &g);
                history.push((f, gnorm));
                log_iter(NAME, self.verbosity, iter, f, gnorm, alpha, numfg);

                pg = problem.precondition(&x, g.clone());
                let beta =
                    self.beta(
                        problem, &x, &g, &pg, &g_old, &pg_old, &d_old, gnorm_old);
                d = problem.add(problem.scale(pg.clone(), -1.0), &d_old, beta);
                steepest = beta == 0.0;
                if !(problem.inner(&x, &d, &g) < 0.0) {
                    if self.verbosity >= 3 {
                        debug!("{}: not a descent direction, restarting", NAME);
                    }
                    d = problem.scale(pg.clone(), -1.0);
                    steepest = true;
                }
            };
        log_end(NAME, self.verbosity, converged, iter, f, gnorm, numfg);
        OptimResult { x, f, g, numfg, numiter: iter, converged, history }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra as na;
    use crate::optim::testing::*;

    #[test]
    fn quadratic() {
        let problem = Quadratic::new(20);
        let x0 = na::DVector::zeros(20);
        let res = ConjugateGradient::new(1e-10, 200, 0).optimize(&problem, x0);
        assert!(res.converged);
        assert_abs_diff_eq!((res.x - problem.solution()).norm(), 0.0, epsilon = 1e-9);
        // energies never increase
        assert!(res.history.windows(2).all(|w| w[1].0 <= w[0].0 + 1e-6 * w[0].0.abs()));
    }

    #[test]
    fn rosenbrock() {
        let res =
            ConjugateGradient::new(1e-8, 2000, 0)
            .optimize(&Rosenbrock, na::dvector![-1.2, 1.0]);
        assert!(res.converged);
        assert_abs_diff_eq!(res.x[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(res.x[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn polak_ribiere_quadratic() {
        let problem = Quadratic::new(12);
        let x0 = na::DVector::zeros(12);
        let res =
            ConjugateGradient::new(1e-10, 500, 0)
            .with_flavor(CGFlavor::PolakRibierePlus)
            .optimize(&problem, x0);
        assert!(res.converged);
        assert_abs_diff_eq!((res.x - problem.solution()).norm(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn lowest_eigenvector_on_sphere() {
        let problem = Rayleigh::new(10);
        let res = ConjugateGradient::new(1e-9, 500, 0).optimize(&problem, problem.start());
        assert!(res.converged);
        assert_abs_diff_eq!(res.f, problem.lowest_eigenvalue(), epsilon = 1e-10);
        assert_abs_diff_eq!(res.x.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn default_linesearch_is_strict() {
        let cg = ConjugateGradient::new(1e-8, 10, 0);
        assert_eq!(cg.linesearch.c2, 0.1);
        assert_eq!(crate::optim::LBFGS::new(1e-8, 10, 0).linesearch.c2, 0.9);
    }

    #[test]
    fn stops_at_maxiter() {
        let res = ConjugateGradient::new(1e-14, 3, 0).optimize(&Rosenbrock, na::dvector![-1.2, 1.0]);
        assert!(!res.converged);
        assert_eq!(res.numiter, 3);
        assert_eq!(res.history.len(), 4);
    }
}
