//! Planar Geometry Primitives for the Magnetic Trajectory
//!
//! ## Overview
//!
//! The detector reasons about the magnetic field vector as a point
//! moving in the X-Y plane. Everything it decides comes down to two
//! derived quantities:
//!
//! - the **distance** between two filtered points (noise culling,
//!   outlier classification), and
//! - the **angle** of one point as seen from another (pulse detection,
//!   angular coverage accounting).
//!
//! Angles are kept in a dedicated newtype that enforces the single
//! invariant the state machine depends on: every stored angle is
//! normalised to the half-open interval `(-pi, pi]`. Differences of
//! two normalised angles are re-normalised, so accumulating many small
//! increments never wraps into nonsense.
//!
//! ## Quadrant convention
//!
//! `Angle::quadrant` follows the standard mathematical numbering in
//! screen coordinates:
//!
//! ```text
//!          pi/2
//!       2   |   1
//!  pi ------+------ 0
//!       3   |   4
//!         -pi/2
//! ```
//!
//! A clockwise rotation of the field vector therefore visits the
//! quadrants in the order 1, 4, 3, 2.

use core::f64::consts::{FRAC_PI_2, PI, TAU};
use core::ops::Sub;

use crate::math;

/// A point in the filtered X-Y plane.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coordinate {
    /// Horizontal component, in (averaged) raw sensor counts.
    pub x: f64,
    /// Vertical component, in (averaged) raw sensor counts.
    pub y: f64,
}

impl Coordinate {
    /// Create a coordinate from its components.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_from(&self, other: &Coordinate) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        math::sqrt(dx * dx + dy * dy)
    }

    /// Angle of the vector pointing from `other` to `self`.
    pub fn angle_from(&self, other: &Coordinate) -> Angle {
        Angle::new(math::atan2(self.y - other.y, self.x - other.x))
    }
}

/// An angle in radians, normalised to `(-pi, pi]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Angle {
    radians: f64,
}

impl Angle {
    /// Zero angle.
    pub const ZERO: Angle = Angle { radians: 0.0 };

    /// Create an angle, normalising the input to `(-pi, pi]`.
    pub fn new(radians: f64) -> Self {
        Self {
            radians: normalise(radians),
        }
    }

    /// The normalised value in radians.
    pub const fn radians(&self) -> f64 {
        self.radians
    }

    /// The value in whole tenths of a degree, for wire transport.
    pub fn degrees_times_10(&self) -> i16 {
        math::round(self.radians * 1800.0 / PI) as i16
    }

    /// Quadrant of this angle, numbered 1 through 4.
    ///
    /// Boundaries belong to the counter-clockwise neighbour: 0 is in
    /// quadrant 1, `pi/2` in quadrant 2, `-pi/2` in quadrant 4. `pi`
    /// (the only representable half-turn) is in quadrant 2.
    pub fn quadrant(&self) -> u8 {
        if self.radians >= 0.0 {
            if self.radians < FRAC_PI_2 {
                1
            } else {
                2
            }
        } else if self.radians < -FRAC_PI_2 {
            3
        } else {
            4
        }
    }
}

impl Sub for Angle {
    type Output = Angle;

    /// Difference of two angles, re-normalised to `(-pi, pi]`.
    fn sub(self, rhs: Angle) -> Angle {
        Angle::new(self.radians - rhs.radians)
    }
}

/// Wrap an arbitrary radian value into `(-pi, pi]`.
fn normalise(radians: f64) -> f64 {
    let mut wrapped = radians % TAU;
    if wrapped > PI {
        wrapped -= TAU;
    } else if wrapped <= -PI {
        wrapped += TAU;
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn distance_is_euclidean() {
        let a = Coordinate::new(1.0, 2.0);
        let b = Coordinate::new(4.0, 6.0);
        assert_relative_eq!(a.distance_from(&b), 5.0);
        assert_relative_eq!(b.distance_from(&a), 5.0);
        assert_relative_eq!(a.distance_from(&a), 0.0);
    }

    #[test]
    fn angle_from_points_toward_self() {
        let origin = Coordinate::new(0.0, 0.0);
        let east = Coordinate::new(3.0, 0.0);
        let north = Coordinate::new(0.0, 7.0);
        assert_relative_eq!(east.angle_from(&origin).radians(), 0.0);
        assert_relative_eq!(north.angle_from(&origin).radians(), FRAC_PI_2);
        assert_relative_eq!(origin.angle_from(&east).radians(), PI);
    }

    #[test]
    fn normalisation_wraps_into_half_open_interval() {
        assert_relative_eq!(Angle::new(PI + 0.25).radians(), -PI + 0.25);
        assert_relative_eq!(Angle::new(-PI - 0.25).radians(), PI - 0.25);
        assert_relative_eq!(Angle::new(3.0 * TAU + 0.5).radians(), 0.5);
        // The boundary itself: -pi maps onto +pi.
        assert_relative_eq!(Angle::new(-PI).radians(), PI);
        assert_relative_eq!(Angle::new(PI).radians(), PI);
    }

    #[test]
    fn subtraction_renormalises() {
        let a = Angle::new(3.0);
        let b = Angle::new(-3.0);
        // 3 - (-3) = 6, wraps to 6 - 2pi.
        assert_relative_eq!((a - b).radians(), 6.0 - TAU);
    }

    #[test]
    fn quadrants_follow_math_convention() {
        assert_eq!(Angle::new(0.1).quadrant(), 1);
        assert_eq!(Angle::new(FRAC_PI_2 + 0.1).quadrant(), 2);
        assert_eq!(Angle::new(-PI + 0.1).quadrant(), 3);
        assert_eq!(Angle::new(-0.1).quadrant(), 4);
    }

    #[test]
    fn quadrant_boundaries() {
        assert_eq!(Angle::new(0.0).quadrant(), 1);
        assert_eq!(Angle::new(FRAC_PI_2).quadrant(), 2);
        assert_eq!(Angle::new(PI).quadrant(), 2);
        assert_eq!(Angle::new(-FRAC_PI_2).quadrant(), 4);
    }

    #[test]
    fn degrees_times_10_rounds() {
        assert_eq!(Angle::new(FRAC_PI_2).degrees_times_10(), 900);
        assert_eq!(Angle::new(-FRAC_PI_2).degrees_times_10(), -900);
        assert_eq!(Angle::ZERO.degrees_times_10(), 0);
    }
}
