//! Synthetic sensor signals.
//!
//! All generators produce integer samples the way the sensor would:
//! real-valued geometry rounded to raw counts. The elliptical sweep
//! uses the (sin, cos) parametrisation so that increasing sample
//! numbers trace the clockwise trajectory a forward-flowing meter
//! produces.

use std::f64::consts::TAU;

use flowsense_core::Sample;

/// Clockwise circular sweep around `center`, `samples_per_rev` samples
/// per revolution, starting `phase_turns` into the cycle.
pub fn clockwise_circle(
    center: (f64, f64),
    radius: f64,
    samples_per_rev: usize,
    count: usize,
    phase_turns: f64,
) -> Vec<Sample> {
    (0..count)
        .map(|k| {
            let angle = (phase_turns + k as f64 / samples_per_rev as f64) * TAU;
            Sample::new(
                (center.0 + radius * angle.sin()).round() as i16,
                (center.1 + radius * angle.cos()).round() as i16,
            )
        })
        .collect()
}

/// Point on the (unrounded) sweep, for splicing generators together.
pub fn circle_point(center: (f64, f64), radius: f64, turns: f64) -> (f64, f64) {
    let angle = turns * TAU;
    (
        center.0 + radius * angle.sin(),
        center.1 + radius * angle.cos(),
    )
}

/// Direction of clockwise travel at `turns` into the sweep, radians.
pub fn travel_direction(turns: f64) -> f64 {
    // d/dt (sin t, cos t) = (cos t, -sin t), so the heading is -t.
    -(turns * TAU)
}

/// Straight march from `from` along `direction` in `step`-sized
/// increments.
pub fn straight_line(from: (f64, f64), direction: f64, step: f64, count: usize) -> Vec<Sample> {
    let (dx, dy) = (direction.cos() * step, direction.sin() * step);
    (1..=count)
        .map(|j| {
            Sample::new(
                (from.0 + dx * j as f64).round() as i16,
                (from.1 + dy * j as f64).round() as i16,
            )
        })
        .collect()
}

/// An unchanging signal.
pub fn constant(x: i16, y: i16, count: usize) -> Vec<Sample> {
    vec![Sample::new(x, y); count]
}
