//! Accuracy of the direct least-squares fit across ellipse shapes,
//! through the public API.

use approx::assert_relative_eq;
use flowsense_core::fit::fit_direct;
use flowsense_core::{Angle, Coordinate, Ellipse};
use std::f64::consts::{PI, TAU};

fn sample(ellipse: &Ellipse, count: usize, arc_turns: f64) -> Vec<Coordinate> {
    (0..count)
        .map(|i| ellipse.point_at(arc_turns * TAU * i as f64 / count as f64))
        .collect()
}

fn assert_recovers(reference: &Ellipse, points: &[Coordinate], epsilon: f64) {
    let fitted = fit_direct(points).expect("fit should succeed");
    assert_relative_eq!(fitted.center.x, reference.center.x, epsilon = epsilon);
    assert_relative_eq!(fitted.center.y, reference.center.y, epsilon = epsilon);
    assert_relative_eq!(fitted.radius.x, reference.radius.x, epsilon = epsilon);
    assert_relative_eq!(fitted.radius.y, reference.radius.y, epsilon = epsilon);
}

#[test]
fn recovers_shapes_across_aspect_ratios_and_rotations() {
    let cases = [
        // Near-circular, like a healthy meter signal.
        Ellipse::new(
            Coordinate::new(-100.0, 100.0),
            Coordinate::new(20.0, 19.0),
            Angle::new(0.9),
        ),
        // Elongated, axis-aligned.
        Ellipse::new(
            Coordinate::new(50.0, 50.0),
            Coordinate::new(40.0, 10.0),
            Angle::ZERO,
        ),
        // Tilted the other way, off-centre.
        Ellipse::new(
            Coordinate::new(300.0, -120.0),
            Coordinate::new(50.0, 20.0),
            Angle::new(-0.7),
        ),
        // Small and at 45 degrees.
        Ellipse::new(
            Coordinate::new(10.0, 10.0),
            Coordinate::new(8.0, 5.0),
            Angle::new(PI / 4.0),
        ),
    ];

    for reference in &cases {
        let points = sample(reference, 32, 1.0);
        assert_recovers(reference, &points, 1e-4);

        let fitted = fit_direct(&points).unwrap();
        // Rotation is only defined modulo a half turn.
        let angle_error =
            (fitted.angle.radians() - reference.angle.radians()).rem_euclid(PI);
        assert!(
            angle_error < 1e-4 || angle_error > PI - 1e-4,
            "rotation mismatch: fitted {} reference {}",
            fitted.angle.radians(),
            reference.angle.radians()
        );
    }
}

#[test]
fn recovers_from_the_detector_coverage_gate() {
    // Six tenths of a revolution is the least coverage the detector
    // will confirm a fit from.
    let reference = Ellipse::new(
        Coordinate::new(-100.0, 100.0),
        Coordinate::new(20.0, 18.0),
        Angle::new(0.3),
    );
    let points = sample(&reference, 32, 0.6);
    assert_recovers(&reference, &points, 1e-4);
}

#[test]
fn quantised_points_fit_within_a_count() {
    // Coordinates rounded to raw counts, as the sensor delivers them.
    let reference = Ellipse::new(
        Coordinate::new(-100.0, 100.0),
        Coordinate::new(20.0, 20.0),
        Angle::ZERO,
    );
    let points: Vec<Coordinate> = sample(&reference, 32, 1.0)
        .into_iter()
        .map(|p| Coordinate::new(p.x.round(), p.y.round()))
        .collect();
    let fitted = fit_direct(&points).expect("fit should succeed");
    assert!((fitted.center.x - reference.center.x).abs() < 1.0);
    assert!((fitted.center.y - reference.center.y).abs() < 1.0);
    assert!((fitted.radius.x - 20.0).abs() < 1.0);
    assert!((fitted.radius.y - 20.0).abs() < 1.0);
}

#[test]
fn degenerate_inputs_fail_cleanly() {
    // A straight trajectory has no ellipse in it.
    let line: Vec<Coordinate> = (0..32)
        .map(|i| Coordinate::new(i as f64 * 4.0, i as f64 * -2.0))
        .collect();
    assert!(fit_direct(&line).is_err());

    // Neither does a stationary signal.
    let still = vec![Coordinate::new(-100.0, 100.0); 32];
    assert!(fit_direct(&still).is_err());
}
