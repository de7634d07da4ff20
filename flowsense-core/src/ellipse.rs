//! Canonical Ellipse Geometry
//!
//! The fitter produces ellipses in canonical form: centre, semi-axis
//! radii and the rotation of the major axis. The detector uses them
//! for two things only, the angle of a point as seen from the centre
//! (pulse counting) and the distance of a point from the boundary
//! (outlier culling), so this type stays deliberately small.

use crate::geometry::{Angle, Coordinate};
use crate::math;

/// An ellipse in canonical centre/radii/rotation form.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ellipse {
    /// Centre of the ellipse.
    pub center: Coordinate,
    /// Semi-axis lengths: `x` along the rotated major axis, `y` along
    /// the minor axis.
    pub radius: Coordinate,
    /// Rotation of the major axis from the +x axis.
    pub angle: Angle,
}

impl Ellipse {
    /// Create an ellipse from its canonical parameters.
    pub const fn new(center: Coordinate, radius: Coordinate, angle: Angle) -> Self {
        Self {
            center,
            radius,
            angle,
        }
    }

    /// Whether the parameters describe a real, bounded ellipse:
    /// finite centre and rotation, strictly positive finite radii.
    pub fn is_valid(&self) -> bool {
        self.radius.x > 0.0
            && self.radius.y > 0.0
            && self.radius.x.is_finite()
            && self.radius.y.is_finite()
            && self.center.x.is_finite()
            && self.center.y.is_finite()
            && self.angle.radians().is_finite()
    }

    /// Point on the boundary at parametric angle `t` (radians, in the
    /// ellipse frame).
    pub fn point_at(&self, t: f64) -> Coordinate {
        let cos_rot = math::cos(self.angle.radians());
        let sin_rot = math::sin(self.angle.radians());
        let px = self.radius.x * math::cos(t);
        let py = self.radius.y * math::sin(t);
        Coordinate::new(
            self.center.x + cos_rot * px - sin_rot * py,
            self.center.y + sin_rot * px + cos_rot * py,
        )
    }

    /// Distance from `point` to the boundary point that shares its
    /// parametric angle.
    ///
    /// This is the radial mismatch in the ellipse frame rather than
    /// the true nearest-boundary distance. For circles the two agree
    /// exactly; for moderate eccentricities the difference is far
    /// below the outlier threshold granularity, and the value is cheap
    /// and deterministic.
    pub fn distance_from(&self, point: &Coordinate) -> f64 {
        let dx = point.x - self.center.x;
        let dy = point.y - self.center.y;
        let cos_rot = math::cos(self.angle.radians());
        let sin_rot = math::sin(self.angle.radians());
        // Into the ellipse frame.
        let xr = dx * cos_rot + dy * sin_rot;
        let yr = -dx * sin_rot + dy * cos_rot;
        let t = math::atan2(yr * self.radius.x, xr * self.radius.y);
        let bx = self.radius.x * math::cos(t);
        let by = self.radius.y * math::sin(t);
        let ex = xr - bx;
        let ey = yr - by;
        math::sqrt(ex * ex + ey * ey)
    }
}
