//! Manifold algebra on the Grassmann manifold of isometries.
//!
//! A point on the manifold is an isometry `W` (an `M × N` matrix with
//! `W†W = 1`, `M ≥ N`), understood up to right-multiplication by a unitary.
//! For MPS, `W` is the left-fused form of a left-canonical site tensor `AL`.
//! Tangent vectors at `W` are matrices `Z` with `W†Z = 0`.
//!
//! The retraction follows geodesics of the manifold,
//!
//! ```text
//! W(α) = W V cos(α S) V† + U sin(α S) V†,        Z = U S V†,
//! ```
//!
//! and tangents are carried along with it by the matching parallel transport.
//! Everything here acts on a single site; unit-cell versions live in
//! [`groundstate::manifold`][crate::groundstate::manifold].

use nalgebra as na;
use num_complex::Complex64 as C64;
use once_cell::unsync::OnceCell;
use crate::linalg;

/// Thin SVD `Z = U S V†` of a tangent matrix.
#[derive(Clone, Debug, PartialEq)]
struct TangentSvd {
    u: na::DMatrix<C64>,
    s: na::DVector<f64>,
    v: na::DMatrix<C64>,
}

/// A tangent vector to the Grassmann manifold at a base point `W`.
///
/// The SVD of the tangent matrix, needed by [`retract`] and [`transport`], is
/// computed on first use and cached.
#[derive(Clone, Debug)]
pub struct GrassmannTangent {
    base: na::DMatrix<C64>,
    z: na::DMatrix<C64>,
    svd: OnceCell<TangentSvd>,
}

impl PartialEq for GrassmannTangent {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.z == other.z
    }
}

impl GrassmannTangent {
    // assumes `w† z == 0`
    fn new_unchecked(base: na::DMatrix<C64>, z: na::DMatrix<C64>) -> Self {
        Self { base, z, svd: OnceCell::new() }
    }

    /// Return the base point.
    pub fn base(&self) -> &na::DMatrix<C64> { &self.base }

    /// Return the tangent matrix `Z`.
    pub fn z(&self) -> &na::DMatrix<C64> { &self.z }

    /// Discard the base point and return the tangent matrix.
    pub fn into_z(self) -> na::DMatrix<C64> { self.z }

    /// Return the Frobenius norm of the tangent matrix.
    pub fn norm(&self) -> f64 { self.z.norm() }

    fn svd(&self) -> &TangentSvd {
        self.svd.get_or_init(|| {
            let svd = self.z.clone().svd(true, true);
            let Some(u) = svd.u else { unreachable!() };
            let Some(v_t) = svd.v_t else { unreachable!() };
            TangentSvd { u, s: svd.singular_values, v: v_t.adjoint() }
        })
    }

    /// Multiply by a real scalar.
    pub fn scale(mut self, c: f64) -> Self {
        self.z.scale_mut(c);
        if let Some(svd) = self.svd.get_mut() {
            if c >= 0.0 {
                svd.s.scale_mut(c);
            } else {
                svd.s.scale_mut(-c);
                svd.u.neg_mut();
            }
        }
        self
    }

    /// Return `self + c · other`.
    ///
    /// Both tangents are assumed to live at the same base point.
    ///
    /// *Panics if the tangent matrices have different shapes.*
    pub fn add(self, other: &Self, c: f64) -> Self {
        if self.z.shape() != other.z.shape() {
            panic!("inconsistent dimensions");
        }
        let Self { base, z, .. } = self;
        Self::new_unchecked(base, z + other.z.scale(c))
    }
}

/// Remove the component of `x` in the image of the isometry `w`, returning
/// `x − w (w† x)`.
pub fn project_complement(x: &na::DMatrix<C64>, w: &na::DMatrix<C64>)
    -> na::DMatrix<C64>
{
    x - w * (w.adjoint() * x)
}

/// Project an arbitrary derivative `d` onto the tangent space at `w`.
pub fn project(d: &na::DMatrix<C64>, w: &na::DMatrix<C64>) -> GrassmannTangent {
    GrassmannTangent::new_unchecked(w.clone(), project_complement(d, w))
}

// elementwise sin and cos of `alpha * s`
fn sincos(s: &na::DVector<f64>, alpha: f64)
    -> (na::DMatrix<C64>, na::DMatrix<C64>)
{
    let sin = s.map(|sk| C64::from((alpha * sk).sin()));
    let cos = s.map(|sk| C64::from((alpha * sk).cos()));
    (na::DMatrix::from_diagonal(&sin), na::DMatrix::from_diagonal(&cos))
}

/// Move from `w` along the geodesic in direction `g` by step length `alpha`.
///
/// Returns the new point `w'` together with `g` transported to `w'`.
pub fn retract(w: &na::DMatrix<C64>, g: &GrassmannTangent, alpha: f64)
    -> (na::DMatrix<C64>, GrassmannTangent)
{
    let TangentSvd { u, s, v } = g.svd();
    let (sin, cos) = sincos(s, alpha);
    let s_mat = na::DMatrix::from_diagonal(&s.map(|sk| C64::from(sk)));
    let wv = w * v;
    let v_adj = v.adjoint();
    let w_new = linalg::polar(&((&wv * &cos + u * &sin) * &v_adj));
    let z_new = (u * &cos - &wv * &sin) * s_mat * v_adj;
    let z_new = project_complement(&z_new, &w_new);
    let g_new = GrassmannTangent::new_unchecked(w_new.clone(), z_new);
    (w_new, g_new)
}

/// Parallel-transport the tangent `h` at `w` along the geodesic defined by
/// `g` and `alpha`, ending at `w_new` (as returned by [`retract`]).
///
/// Transporting `g` itself reproduces the second output of [`retract`].
pub fn transport(
    h: &GrassmannTangent,
    w: &na::DMatrix<C64>,
    g: &GrassmannTangent,
    alpha: f64,
    w_new: &na::DMatrix<C64>,
) -> GrassmannTangent
{
    let TangentSvd { u, s, v } = g.svd();
    let (sin, cos) = sincos(s, alpha);
    let cos_m1 = cos - na::DMatrix::<C64>::identity(s.len(), s.len());
    let wv = w * v;
    let ud_h = u.adjoint() * &h.z;
    let z_new = &h.z + (u * cos_m1 - wv * sin) * ud_h;
    let z_new = project_complement(&z_new, w_new);
    GrassmannTangent::new_unchecked(w_new.clone(), z_new)
}

/// Euclidean inner product `Re tr(d1† d2)` between two tangents at `w`.
pub fn inner(_w: &na::DMatrix<C64>, d1: &GrassmannTangent, d2: &GrassmannTangent)
    -> f64
{
    d1.z.dotc(&d2.z).re
}
