//! Limited-memory BFGS.
//!
//! The curvature pairs `(s, y)` are carried from one iterate to the next with
//! [`Problem::transport`]. The initial inverse Hessian of the two-loop
//! recursion is the preconditioner scaled by `⟨s, y⟩ / ⟨y, y⟩` of the most
//! recent pair.

use std::collections::VecDeque;
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

/// Limited-memory BFGS with preconditioning.
#[derive(Clone, Debug, PartialEq)]
pub struct LBFGS {
    /// Number of stored curvature pairs.
    pub memory: usize,
    pub gradtol: f64,
    pub maxiter: usize,
    pub verbosity: usize,
    pub linesearch: LineSearch,
}

impl Default for LBFGS {
    fn default() -> Self { Self::new(1e-8, 100, 1) }
}

// a stored curvature pair with ρ = 1 / ⟨s, y⟩
struct Pair<G> {
    s: G,
    y: G,
    rho: f64,
}

impl LBFGS {
    /// Create a new optimizer storing 8 curvature pairs.
    pub fn new(gradtol: f64, maxiter: usize, verbosity: usize) -> Self {
        Self {
            memory: 8,
            gradtol,
            maxiter,
            verbosity,
            linesearch: LineSearch::default(),
        }
    }

    /// Set the number of stored curvature pairs.
    pub fn with_memory(mut self, memory: usize) -> Self {
        self.memory = memory.max(1);
        self
    }

    /// Set the line search.
    pub fn with_linesearch(mut self, linesearch: LineSearch) -> Self {
        self.linesearch = linesearch;
        self
    }

    // -H g by two-loop recursion
    fn direction<P>(
        &self,
        problem: &P,
        x: &P::Point,
        g: &P::Tangent,
        pairs: &VecDeque<Pair<P::Tangent>>,
    ) -> P::Tangent
    where P: Problem
    {
        let mut q = g.clone();
        let mut a: Vec<f64> = Vec::with_capacity(pairs.len());
        for Pair { s, y, rho } in pairs.iter().rev() {
            let ak = rho * problem.inner(x, s, &q);
            q = problem.add(q, y, -ak);
            a.push(ak);
        }
        let gamma =
            pairs.back()
            .map(|Pair { y, rho, .. }| 1.0 / (rho * problem.inner(x, y, y)))
            .filter(|gamma| gamma.is_finite() && *gamma > 0.0)
            .unwrap_or(1.0);
        let mut r = problem.scale(problem.precondition(x, q), gamma);
        for (Pair { s, y, rho }, ak) in pairs.iter().zip(a.into_iter().rev()) {
            let bk = rho * problem.inner(x, y, &r);
            r = problem.add(r, s, ak - bk);
        }
        problem.scale(r, -1.0)
    }
}

impl Optimizer for LBFGS {
    fn optimize<P>(&self, problem: &P, x0: P::Point)
        -> OptimResult<P::Point, P::Tangent>
    where P: Problem
    {
        const NAME: &str = "LBFGS";
        let mut x = x0;
        let (mut f, mut g) = problem.fg(&x);
        let mut numfg: usize = 1;
        let mut gnorm = gradnorm(problem, &x, &g);
        let mut history: Vec<(f64, f64)> = vec![(f, gnorm)];
        log_start(NAME, self.verbosity, f, gnorm);

        let mut pairs: VecDeque<Pair<P::Tangent>> =
            VecDeque::with_capacity(self.memory);
        let mut alpha: f64 = 1.0;
        let mut iter: usize = 0;
        let converged =
            loop {
                if gnorm <= self.gradtol { break true; }
                if iter >= self.maxiter { break false; }
                iter += 1;

                let mut d = self.direction(problem, &x, &g, &pairs);
                if !(problem.inner(&x, &d, &g) < 0.0) {
                    if self.verbosity >= 3 {
                        debug!("{}: not a descent direction, resetting memory", NAME);
                    }
                    pairs.clear();
                    d = problem.scale(problem.precondition(&x, g.clone()), -1.0);
                }
                // quasi-Newton steps have a natural length of one
                let alpha0 = if pairs.is_empty() { alpha } else { 1.0 };

                let step =
                    self.linesearch.search(
                        problem, &x, f, &g, &d, alpha0, self.verbosity);
                numfg += step.numfg;
                if step.is_rejected(f) {
                    let restart = !pairs.is_empty();
                    log_rejected(NAME, self.verbosity, iter, f, step.f, restart);
                    history.push((f, gnorm));
                    if !restart { break false; }
                    pairs.clear();
                    continue;
                }
                alpha = step.alpha;
                let (xn, fn_, gn) = problem.finalize(step.x, step.f, step.g, iter);

                pairs =
                    pairs.into_iter()
                    .map(|Pair { s, y, rho }| {
                        Pair {
                            s: problem.transport(&s, &x, &d, alpha, &xn),
                            y: problem.transport(&y, &x, &d, alpha, &xn),
                            rho,
                        }
                    })
                    .collect();
                let g_old = problem.transport(&g, &x, &d, alpha, &xn);
                let s = problem.scale(step.d, alpha);
                let y = problem.add(gn.clone(), &g_old, -1.0);
                let sy = problem.inner(&xn, &s, &y);
                if sy > 0.0 && sy.is_finite() {
                    if pairs.len() == self.memory { pairs.pop_front(); }
                    pairs.push_back(Pair { s, y, rho: 1.0 / sy });
                } else if self.verbosity >= 3 {
                    debug!("{}: skipping update with ⟨s, y⟩ = {:.4e}", NAME, sy);
                }

                x = xn;
                f = fn_;
                g = gn;
                gnorm = gradnorm(problem, &x, &g);
                history.push((f, gnorm));
                log_iter(NAME, self.verbosity, iter, f, gnorm, alpha, numfg);
            };
        log_end(NAME, self.verbosity, converged, iter, f, gnorm, numfg);
        OptimResult { x, f, g, numfg, numiter: iter, converged, history }
    }
}
