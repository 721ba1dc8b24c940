//! Preconditioned gradient descent.

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

/// Gradient descent along the preconditioned gradient.
#[derive(Clone, Debug, PartialEq)]
pub struct GradientDescent {
    pub gradtol: f64,
    pub maxiter: usize,
    pub verbosity: usize,
    pub linesearch: LineSearch,
}

impl Default for GradientDescent {
    fn default() -> Self { Self::new(1e-8, 1000, 1) }
}

impl GradientDescent {
    pub fn new(gradtol: f64, maxiter: usize, verbosity: usize) -> Self {
        Self { gradtol, maxiter, verbosity, linesearch: LineSearch::default() }
    }

    /// Set the line search.
    pub fn with_linesearch(mut self, linesearch: LineSearch) -> Self {
        self.linesearch = linesearch;
        self
    }
}

impl Optimizer for GradientDescent {
    fn optimize<P>(&self, problem: &P, x0: P::Point)
        -> OptimResult<P::Point, P::Tangent>
    where P: Problem
    {
        const NAME: &str = "GD";
        let mut x = x0;
        let (mut f, mut g) = problem.fg(&x);
        let mut numfg: usize = 1;
        let mut gnorm = gradnorm(problem, &x, &g);
        let mut history: Vec<(f64, f64)> = vec![(f, gnorm)];
        log_start(NAME, self.verbosity, f, gnorm);

        let mut alpha: f64 = 1.0;
        let mut iter: usize = 0;
        let converged =
            loop {
                if gnorm <= self.gradtol { break true; }
                if iter >= self.maxiter { break false; }
                iter += 1;

                let d = problem.scale(problem.precondition(&x, g.clone()), -1.0);
                let step =
                    self.linesearch.search(
                        problem, &x, f, &g, &d, alpha, self.verbosity);
                numfg += step.numfg;
                if step.is_rejected(f) {
                    log_rejected(NAME, self.verbosity, iter, f, step.f, false);
                    history.push((f, gnorm));
                    break false;
                }
                alpha = step.alpha;
                (x, f, g) = problem.finalize(step.x, step.f, step.g, iter);
                gnorm = gradnorm(problem, &x, &g);
                history.push((f, gnorm));
                log_iter(NAME, self.verbosity, iter, f, gnorm, alpha, numfg);
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
        let problem = Quadratic::new(6);
        let x0 = na::DVector::zeros(6);
        let res = GradientDescent::new(1e-9, 5000, 0).optimize(&problem, x0);
        assert!(res.converged);
        assert_abs_diff_eq!((res.x - problem.solution()).norm(), 0.0, epsilon = 1e-8);
        assert!(res.numfg >= res.numiter);
    }
}
