//! Direct Least-Squares Ellipse Fitting
//!
//! ## Overview
//!
//! The detector hands accepted points to this fitter one at a time.
//! When the fixed buffer fills, one fit is run over the whole buffer
//! and the buffer is emptied. The fit is the direct least-squares
//! method of Fitzgibbon, Pilu and Fisher (1999): it solves a small
//! constrained eigenproblem whose constraint guarantees the solution
//! is an ellipse rather than a hyperbola or parabola, with no
//! iteration and no initial guess.
//!
//! ## Zero-allocation numerics
//!
//! The classic formulation builds an n-by-6 design matrix. On an
//! embedded target that is an allocation and a cache liability for no
//! benefit: the normal equations only ever need the 6-by-6 scatter
//! matrix, which this implementation accumulates row by row on the
//! stack. Everything downstream is 3-by-3 arithmetic:
//!
//! ```text
//! points ──→ scatter S (6x6) ──→ reduced M (3x3) ──→ eigen solve
//!                                                        │
//!             canonical ellipse  ←── conic coefficients ←┘
//! ```
//!
//! Points are shifted to their centroid and rescaled before the solve.
//! Raw magnetometer coordinates sit hundreds of counts from the
//! origin, and the squared terms of the design rows would otherwise
//! spread across eight orders of magnitude.
//!
//! ## Contract with the detector
//!
//! - `fit` is deterministic: the same buffer contents produce the same
//!   result, valid or not.
//! - `fit` always empties the buffer, success or failure.
//! - A returned ellipse is valid in the [`Ellipse::is_valid`] sense
//!   (finite centre and rotation, strictly positive radii).

use core::f64::consts::{FRAC_PI_2, PI, SQRT_2};

use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};
use thiserror_no_std::Error;

use crate::constants::FIT_BUFFER_SIZE;
use crate::ellipse::Ellipse;
use crate::geometry::{Angle, Coordinate};
use crate::math;

/// Minimum number of points a conic fit needs.
const MIN_FIT_POINTS: usize = 6;

/// Reasons a fit attempt can fail.
///
/// None of these are fatal to the caller: the detector reports them
/// and keeps measuring with whatever ellipse it had before.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitError {
    /// Fewer points than the conic has degrees of freedom.
    #[error("too few points: need {needed}, got {got}")]
    TooFewPoints {
        /// Minimum usable point count.
        needed: usize,
        /// Points actually buffered.
        got: usize,
    },
    /// The point set does not constrain a conic (collinear points,
    /// repeated points, numerically singular scatter).
    #[error("point set is degenerate")]
    Degenerate,
    /// The best-fitting conic is not a real bounded ellipse.
    #[error("conic solution is not an ellipse")]
    NotAnEllipse,
}

#[cfg(feature = "defmt")]
impl defmt::Format for FitError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::TooFewPoints { needed, got } => {
                defmt::write!(fmt, "too few points: need {}, got {}", needed, got)
            }
            Self::Degenerate => defmt::write!(fmt, "degenerate point set"),
            Self::NotAnEllipse => defmt::write!(fmt, "not an ellipse"),
        }
    }
}

/// Point buffer plus fit driver, owned by one detector.
#[derive(Debug, Default)]
pub struct EllipseFit {
    points: heapless::Vec<Coordinate, FIT_BUFFER_SIZE>,
}

impl EllipseFit {
    /// Create an empty fitter.
    pub const fn new() -> Self {
        Self {
            points: heapless::Vec::new(),
        }
    }

    /// Discard all buffered points.
    pub fn begin(&mut self) {
        self.points.clear();
    }

    /// Append a point. Points offered while the buffer is full are
    /// dropped; the caller is expected to fit on every fill.
    pub fn add(&mut self, point: Coordinate) {
        let _ = self.points.push(point);
    }

    /// Whether the buffer has reached capacity.
    pub fn is_full(&self) -> bool {
        self.points.is_full()
    }

    /// Number of buffered points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Fit an ellipse to the buffered points and empty the buffer.
    pub fn fit(&mut self) -> Result<Ellipse, FitError> {
        let result = fit_direct(&self.points);
        self.points.clear();
        result
    }
}

/// Direct least-squares ellipse fit over a point slice.
pub fn fit_direct(points: &[Coordinate]) -> Result<Ellipse, FitError> {
    if points.len() < MIN_FIT_POINTS {
        return Err(FitError::TooFewPoints {
            needed: MIN_FIT_POINTS,
            got: points.len(),
        });
    }

    let frame = NormalisedFrame::of(points);

    // Scatter matrix S = sum of z zᵀ with z = [x², xy, y², x, y, 1].
    let mut scatter = Matrix6::<f64>::zeros();
    for point in points {
        let (x, y) = frame.forward(point);
        let z = Vector6::new(x * x, x * y, y * y, x, y, 1.0);
        scatter += z * z.transpose();
    }

    // Block partition:  S = [S11 S12; S12ᵀ S22].
    let s11 = scatter.fixed_view::<3, 3>(0, 0).into_owned();
    let s12 = scatter.fixed_view::<3, 3>(0, 3).into_owned();
    let s22 = scatter.fixed_view::<3, 3>(3, 3).into_owned();

    let s22_inv = s22.try_inverse().ok_or(FitError::Degenerate)?;
    let reduced = s11 - s12 * s22_inv * s12.transpose();

    // Ellipse constraint 4AC - B² = 1 as aᵀ C₁ a with
    // C₁ = [0 0 2; 0 -1 0; 2 0 0]; its inverse is constant.
    let c1_inv = Matrix3::new(0.0, 0.0, 0.5, 0.0, -1.0, 0.0, 0.5, 0.0, 0.0);
    let system = c1_inv * reduced;

    let quadratic = constrained_eigenvector(&system).ok_or(FitError::NotAnEllipse)?;
    let linear = -s22_inv * s12.transpose() * quadratic;

    let coefficients = frame.backward_conic(&quadratic, &linear);
    conic_to_ellipse(&coefficients).ok_or(FitError::NotAnEllipse)
}

/// Similarity transform that centres a point cloud on its centroid and
/// scales the mean centroid distance to sqrt(2).
struct NormalisedFrame {
    mean_x: f64,
    mean_y: f64,
    scale: f64,
}

impl NormalisedFrame {
    fn of(points: &[Coordinate]) -> Self {
        let n = points.len() as f64;
        let mut mean_x = 0.0;
        let mut mean_y = 0.0;
        for point in points {
            mean_x += point.x;
            mean_y += point.y;
        }
        mean_x /= n;
        mean_y /= n;

        let mut mean_dist = 0.0;
        for point in points {
            let dx = point.x - mean_x;
            let dy = point.y - mean_y;
            mean_dist += math::sqrt(dx * dx + dy * dy);
        }
        mean_dist /= n;

        let scale = if mean_dist > 1e-12 {
            SQRT_2 / mean_dist
        } else {
            1.0
        };

        Self {
            mean_x,
            mean_y,
            scale,
        }
    }

    fn forward(&self, point: &Coordinate) -> (f64, f64) {
        (
            (point.x - self.mean_x) * self.scale,
            (point.y - self.mean_y) * self.scale,
        )
    }

    /// Express a conic fitted in the normalised frame in original
    /// coordinates, by substituting x' = s(x - mx), y' = s(y - my).
    fn backward_conic(&self, quadratic: &Vector3<f64>, linear: &Vector3<f64>) -> [f64; 6] {
        let (a_n, b_n, c_n) = (quadratic[0], quadratic[1], quadratic[2]);
        let (d_n, e_n, f_n) = (linear[0], linear[1], linear[2]);
        let (mx, my, s) = (self.mean_x, self.mean_y, self.scale);
        let s2 = s * s;

        let a = a_n * s2;
        let b = b_n * s2;
        let c = c_n * s2;
        let d = -2.0 * a_n * s2 * mx - b_n * s2 * my + d_n * s;
        let e = -b_n * s2 * mx - 2.0 * c_n * s2 * my + e_n * s;
        let f = a_n * s2 * mx * mx + b_n * s2 * mx * my + c_n * s2 * my * my
            - d_n * s * mx
            - e_n * s * my
            + f_n;

        [a, b, c, d, e, f]
    }
}

/// Solve the reduced eigenproblem and return the eigenvector of the
/// quadratic conic part that satisfies the ellipse constraint
/// 4 v₀ v₂ - v₁² > 0. By the Fitzgibbon argument exactly one
/// eigenvalue produces such a vector; with numerical noise more than
/// one root may qualify, in which case the smallest-magnitude
/// eigenvalue wins.
fn constrained_eigenvector(system: &Matrix3<f64>) -> Option<Vector3<f64>> {
    // Characteristic polynomial λ³ - tr λ² + m λ - det, with m the sum
    // of the principal 2x2 minors.
    let a = system;
    let trace = a[(0, 0)] + a[(1, 1)] + a[(2, 2)];
    let minor_sum = a[(0, 0)] * a[(1, 1)] - a[(0, 1)] * a[(1, 0)]
        + a[(0, 0)] * a[(2, 2)]
        - a[(0, 2)] * a[(2, 0)]
        + a[(1, 1)] * a[(2, 2)]
        - a[(1, 2)] * a[(2, 1)];
    let det = a.determinant();

    let mut roots = [0.0f64; 3];
    let root_count = real_cubic_roots(-trace, minor_sum, -det, &mut roots);

    let mut best: Option<(f64, Vector3<f64>)> = None;
    for &root in roots.iter().take(root_count) {
        let shifted = system - Matrix3::identity() * root;
        let Some(vector) = null_vector(&shifted) else {
            continue;
        };
        let constraint = 4.0 * vector[0] * vector[2] - vector[1] * vector[1];
        if constraint <= 0.0 {
            continue;
        }
        match &best {
            Some((magnitude, _)) if math::abs(root) >= *magnitude => {}
            _ => best = Some((math::abs(root), vector)),
        }
    }
    best.map(|(_, vector)| vector)
}

/// Null vector of a near-singular 3x3 matrix.
///
/// For a rank-2 matrix every row of the adjugate is proportional to
/// the null vector; the row with the largest norm is the numerically
/// best conditioned one.
fn null_vector(m: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let rows = [
        Vector3::new(
            m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)],
            m[(1, 2)] * m[(2, 0)] - m[(1, 0)] * m[(2, 2)],
            m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)],
        ),
        Vector3::new(
            m[(0, 2)] * m[(2, 1)] - m[(0, 1)] * m[(2, 2)],
            m[(0, 0)] * m[(2, 2)] - m[(0, 2)] * m[(2, 0)],
            m[(0, 1)] * m[(2, 0)] - m[(0, 0)] * m[(2, 1)],
        ),
        Vector3::new(
            m[(0, 1)] * m[(1, 2)] - m[(0, 2)] * m[(1, 1)],
            m[(0, 2)] * m[(1, 0)] - m[(0, 0)] * m[(1, 2)],
            m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)],
        ),
    ];

    let mut best = rows[0];
    let mut best_norm = best.norm_squared();
    for row in &rows[1..] {
        let norm = row.norm_squared();
        if norm > best_norm {
            best = *row;
            best_norm = norm;
        }
    }

    if best_norm < 1e-30 {
        return None;
    }
    Some(best / math::sqrt(best_norm))
}

/// Real roots of λ³ + p₂ λ² + p₁ λ + p₀. Returns the root count (1 or
/// 3, counting repeats) with the roots in `out`.
fn real_cubic_roots(p2: f64, p1: f64, p0: f64, out: &mut [f64; 3]) -> usize {
    // Depressed form t³ + pt + q with λ = t - p₂/3.
    let shift = -p2 / 3.0;
    let p = p1 - p2 * p2 / 3.0;
    let q = 2.0 * p2 * p2 * p2 / 27.0 - p2 * p1 / 3.0 + p0;

    let discriminant = -4.0 * p * p * p - 27.0 * q * q;
    if discriminant >= 0.0 {
        // Three real roots via the trigonometric method.
        let r = math::sqrt(-p / 3.0);
        let cos_arg = if r < 1e-15 {
            0.0
        } else {
            (-q / (2.0 * r * r * r)).clamp(-1.0, 1.0)
        };
        let theta = math::acos(cos_arg);
        let two_r = 2.0 * r;
        out[0] = two_r * math::cos(theta / 3.0) + shift;
        out[1] = two_r * math::cos((theta + 2.0 * PI) / 3.0) + shift;
        out[2] = two_r * math::cos((theta + 4.0 * PI) / 3.0) + shift;
        3
    } else {
        // One real root via Cardano.
        let sqrt_part = math::sqrt(q * q / 4.0 + p * p * p / 27.0);
        out[0] = math::cbrt(-q / 2.0 + sqrt_part) + math::cbrt(-q / 2.0 - sqrt_part) + shift;
        1
    }
}

/// Convert general conic coefficients `A x² + B xy + C y² + D x + E y
/// + F = 0` to canonical ellipse parameters. Returns `None` when the
/// conic is not a real bounded ellipse.
fn conic_to_ellipse(coefficients: &[f64; 6]) -> Option<Ellipse> {
    let [a, b, c, d, e, f] = *coefficients;

    // Must be elliptic at all.
    let discriminant = b * b - 4.0 * a * c;
    if !(discriminant < 0.0) {
        return None;
    }

    // Centre from the gradient zero:
    //   2A cx + B cy + D = 0
    //   B cx + 2C cy + E = 0
    let denom = -discriminant; // 4AC - B² > 0
    let cx = (b * e - 2.0 * c * d) / denom;
    let cy = (b * d - 2.0 * a * e) / denom;

    // Rotation of the principal axes.
    let rotation = if math::abs(a - c) < 1e-15 && math::abs(b) < 1e-15 {
        0.0
    } else {
        0.5 * math::atan2(b, a - c)
    };

    // Eigenvalues of the quadratic part give the axis scales.
    let sum = a + c;
    let diff = math::sqrt((a - c) * (a - c) + b * b);
    let lambda_major = (sum + diff) / 2.0;
    let lambda_minor = (sum - diff) / 2.0;

    // Conic value at the centre.
    let f_center = a * cx * cx + b * cx * cy + c * cy * cy + d * cx + e * cy + f;
    if math::abs(f_center) < 1e-15 {
        return None;
    }

    let r1_sq = -f_center / lambda_major;
    let r2_sq = -f_center / lambda_minor;
    if r1_sq <= 0.0 || r2_sq <= 0.0 {
        return None;
    }

    let r1 = math::sqrt(r1_sq);
    let r2 = math::sqrt(r2_sq);

    // Canonicalise: radius.x is the major semi-axis, rotation follows.
    let (major, minor, mut rotation) = if r1 >= r2 {
        (r1, r2, rotation)
    } else {
        (r2, r1, rotation + FRAC_PI_2)
    };

    // Axis rotation is only meaningful modulo a half turn.
    while rotation > FRAC_PI_2 {
        rotation -= PI;
    }
    while rotation <= -FRAC_PI_2 {
        rotation += PI;
    }

    let ellipse = Ellipse::new(
        Coordinate::new(cx, cy),
        Coordinate::new(major, minor),
        Angle::new(rotation),
    );
    ellipse.is_valid().then_some(ellipse)
}
