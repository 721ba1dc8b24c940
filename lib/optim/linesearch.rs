//! Line search along a retraction curve.
//!
//! Given a point `x`, a descent direction `d`, and the curve
//! `φ(α) = f(R(x, α d))`, find a step `α > 0` satisfying either the (weak)
//! Wolfe conditions
//!
//! ```text
//! φ(α) ≤ φ(0) + c₁ α φ'(0)
//! φ'(α) ≥ c₂ φ'(0)
//! ```
//!
//! or the approximate Wolfe conditions of Hager and Zhang,
//!
//! ```text
//! (2c₁ − 1) φ'(0) ≥ φ'(α) ≥ c₂ φ'(0)
//! φ(α) ≤ φ(0) + ε |φ(0)|
//! ```
//!
//! which remain usable once differences in `φ` drop below rounding error. The
//! search expands the step until the minimum is bracketed, then shrinks the
//! bracket with safeguarded secant steps, falling back to bisection.

use log::debug;
use super::Problem;

/// Result of a line search.
#[derive(Clone, Debug)]
pub struct LineSearchStep<X, G> {
    /// New point.
    pub x: X,
    /// Objective function at the new point.
    pub f: f64,
    /// Gradient at the new point.
    pub g: G,
    /// Search direction carried to the new point by the retraction.
    pub d: G,
    /// Accepted step length.
    pub alpha: f64,
    /// Number of objective/gradient evaluations.
    pub numfg: usize,
    /// `false` if the evaluation budget ran out before an acceptable step was
    /// found, in which case the best point seen is returned.
    pub accepted: bool,
}

impl<X, G> LineSearchStep<X, G> {
    /// Return `true` if the search failed and the best point it found does
    /// not improve on the starting value `f0`, in which case the step must be
    /// discarded.
    pub fn is_rejected(&self, f0: f64) -> bool {
        !self.accepted && !(self.f <= f0)
    }
}

/// Wolfe-type line search.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LineSearch {
    /// Sufficient decrease parameter.
    pub c1: f64,
    /// Curvature parameter.
    pub c2: f64,
    /// Relative tolerance on `φ` for the approximate Wolfe conditions.
    pub epsilon: f64,
    /// Factor by which the step grows while no bracket is found.
    pub expansion: f64,
    /// Maximum number of evaluations per search.
    pub maxfg: usize,
}

impl Default for LineSearch {
    fn default() -> Self {
        Self {
            c1: 1e-4,
            c2: 0.9,
            epsilon: 1e-6,
            expansion: 4.0,
            maxfg: 30,
        }
    }
}

// a single sample of φ
#[derive(Clone)]
struct Sample<X, G> {
    alpha: f64,
    x: X,
    f: f64,
    g: G,
    d: G,
    df: f64,
}

impl LineSearch {
    /// Set the sufficient decrease and curvature parameters.
    ///
    /// *Panics unless `0 < c1 < c2 < 1`.*
    pub fn with_wolfe(mut self, c1: f64, c2: f64) -> Self {
        if !(0.0 < c1 && c1 < c2 && c2 < 1.0) {
            panic!("line search parameters must satisfy 0 < c1 < c2 < 1");
        }
        self.c1 = c1;
        self.c2 = c2;
        self
    }

    /// Set the maximum number of evaluations per search.
    pub fn with_maxfg(mut self, maxfg: usize) -> Self {
        self.maxfg = maxfg.max(1);
        self
    }

    fn wolfe(&self, f0: f64, df0: f64, alpha: f64, f: f64, df: f64) -> bool {
        f <= f0 + self.c1 * alpha * df0 && df >= self.c2 * df0
    }

    fn approx_wolfe(&self, f0: f64, df0: f64, f: f64, df: f64) -> bool {
        (2.0 * self.c1 - 1.0) * df0 >= df
            && df >= self.c2 * df0
            && f <= f0 + self.epsilon * f0.abs()
    }

    fn sufficient_decrease(&self, f0: f64, df0: f64, alpha: f64, f: f64) -> bool
    {
        f.is_finite()
            && (f <= f0 + self.c1 * alpha * df0 || f <= f0 + self.epsilon * f0.abs())
    }

    fn sample<P>(&self, problem: &P, x: &P::Point, d: &P::Tangent, alpha: f64)
        -> Sample<P::Point, P::Tangent>
    where P: Problem
    {
        let (xa, da) = problem.retract(x, d, alpha);
        let (fa, ga) = problem.fg(&xa);
        let dfa = problem.inner(&xa, &ga, &da);
        Sample { alpha, x: xa, f: fa, g: ga, d: da, df: dfa }
    }

    /// Search along `d` starting from `x`, where `f` and `g` are the objective
    /// and gradient at `x`, and `alpha0` is the first step tried.
    ///
    /// `d` is expected to be a descent direction; otherwise the search
    /// degenerates to returning the smallest trial step.
    pub fn search<P>(
        &self,
        problem: &P,
        x: &P::Point,
        f: f64,
        g: &P::Tangent,
        d: &P::Tangent,
        alpha0: f64,
        verbosity: usize,
    ) -> LineSearchStep<P::Point, P::Tangent>
    where P: Problem
    {
        let df0 = problem.inner(x, g, d);
        if verbosity >= 3 {
            debug!("linesearch: start with φ(0) = {:.12e}, φ'(0) = {:.4e}", f, df0);
        }
        let mut lo: (f64, f64, f64) = (0.0, f, df0); // (α, φ, φ')
        let mut hi: Option<(f64, f64, f64)> = None;
        let mut best: Option<Sample<P::Point, P::Tangent>> = None;
        let mut alpha = if alpha0.is_finite() && alpha0 > 0.0 { alpha0 } else { 1.0 };
        let mut numfg: usize = 0;

        while numfg < self.maxfg {
            let s = self.sample(problem, x, d, alpha);
            numfg += 1;
            if verbosity >= 3 {
                debug!(
                    "linesearch: α = {:.4e}: φ = {:.12e}, φ' = {:.4e}",
                    s.alpha, s.f, s.df,
                );
            }
            if s.f.is_finite()
                && (
                    self.wolfe(f, df0, s.alpha, s.f, s.df)
                    || self.approx_wolfe(f, df0, s.f, s.df)
                )
            {
                let Sample { alpha, x, f, g, d, .. } = s;
                return LineSearchStep { x, f, g, d, alpha, numfg, accepted: true };
            }

            if self.sufficient_decrease(f, df0, s.alpha, s.f) && s.df < 0.0 {
                // still descending steeply; move the lower end
                lo = (s.alpha, s.f, s.df);
            } else {
                hi = Some((s.alpha, s.f, s.df));
            }
            if best.as_ref().map(|b| s.f < b.f).unwrap_or(s.f.is_finite()) {
                best = Some(s);
            }

            alpha = match hi {
                None => lo.0 * self.expansion,
                Some(h) => next_trial(lo, h),
            };
        }

        if verbosity >= 3 {
            debug!("linesearch: no acceptable step after {} evaluations", numfg);
        }
        let s =
            match best {
                Some(b) => b,
                None => {
                    numfg += 1;
                    self.sample(problem, x, d, lo.0.max(alpha))
                },
            };
        let Sample { alpha, x, f, g, d, .. } = s;
        LineSearchStep { x, f, g, d, alpha, numfg, accepted: false }
    }
}

// secant step on the derivative between the bracket ends, kept away from the
// ends; bisection otherwise
fn next_trial(lo: (f64, f64, f64), hi: (f64, f64, f64)) -> f64 {
    let (a, _, da) = lo;
    let (b, fb, db) = hi;
    let width = b - a;
    let bisect = a + 0.5 * width;
    if !fb.is_finite() || !db.is_finite() || da >= 0.0 || db <= da {
        return bisect;
    }
    let secant = (a * db - b * da) / (db - da);
    if secant.is_finite()
        && secant > a + 0.1 * width
        && secant < b - 0.1 * width
    {
        secant
    } else {
        bisect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra as na;
    use crate::optim::testing::*;

    #[test]
    fn accepted_step_satisfies_wolfe() {
        let problem = Rosenbrock;
        let ls = LineSearch::default();
        let x = na::dvector![-1.2, 1.0];
        let (f, g) = problem.fg(&x);
        let d = -&g;
        let step = ls.search(&problem, &x, f, &g, &d, 1.0, 0);
        assert!(step.accepted);
        assert!(step.f < f);
        let df0 = g.dot(&d);
        let df = step.g.dot(&step.d);
        assert!(df >= ls.c2 * df0);
        assert!(step.f <= f + ls.c1 * step.alpha * df0 || step.f <= f * (1.0 + ls.epsilon));
    }

    #[test]
    fn expands_short_initial_step() {
        let problem = Quadratic::new(4);
        let ls = LineSearch::default();
        let x = na::DVector::zeros(4);
        let (f, g) = problem.fg(&x);
        let d = -&g;
        let step = ls.search(&problem, &x, f, &g, &d, 1e-6, 0);
        assert!(step.accepted);
        assert!(step.alpha > 1e-6);
        assert!(step.numfg > 1);
    }

    #[test]
    fn exhausted_budget() {
        let problem = Quadratic::new(4);
        let ls = LineSearch::default().with_maxfg(1);
        let x = na::DVector::zeros(4);
        let (f, g) = problem.fg(&x);
        let d = -&g;

        // far past the minimum: the only sample is worse than the start
        let step = ls.search(&problem, &x, f, &g, &d, 50.0, 0);
        assert!(!step.accepted);
        assert_eq!(step.numfg, 1);
        assert!(step.f > f);
        assert!(step.is_rejected(f));

        // too short to satisfy the curvature condition, but still an
        // improvement
        let step = ls.search(&problem, &x, f, &g, &d, 1e-6, 0);
        assert!(!step.accepted);
        assert!(step.f < f);
        assert!(!step.is_rejected(f));
    }

    #[test]
    fn secant_stays_inside_bracket() {
        let a = next_trial((0.0, 1.0, -1.0), (1.0, 2.0, 1.0));
        assert!((a - 0.5).abs() < 1e-14);
        let a = next_trial((0.0, 1.0, -1.0), (1.0, f64::NAN, f64::NAN));
        assert!((a - 0.5).abs() < 1e-14);
        let a = next_trial((0.0, 1.0, -1.0), (1.0, 2.0, 1e-8));
        assert!(a > 0.0 && a < 1.0);
    }
}
