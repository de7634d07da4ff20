//! Flow Cycle Detector
//!
//! ## Overview
//!
//! Water flowing through the meter spins an impeller with a small
//! magnet in it. Seen through a two-axis magnetometer the field vector
//! traces a noisy clockwise ellipse in the X-Y plane, one revolution
//! per unit of volume. This module turns the raw sample stream into
//! one `Pulse` event per revolution while rejecting noise, flatlines,
//! outliers and sensor drift.
//!
//! Absolute field values are not predictable: the DC bias drifts with
//! temperature and nearby appliances couple into the signal. The
//! detector therefore never compares against fixed positions. It
//! follows the *shape* of the trajectory:
//!
//! ```text
//! raw sample ──→ ingress gate ──→ boxcar filter ──→ relevance filter
//!                    │                                    │
//!                 anomalies                        accepted points
//!                                                         │
//!                              ┌──────────────────────────┤
//!                              ▼                          ▼
//!                        pulse detector            ellipse fitter
//!                      (quadrant tracking)      (fit per 32 points)
//!                              │                          │
//!                           Pulse                 confirmed ellipse
//! ```
//!
//! ## Two regimes
//!
//! Before an ellipse fit is confirmed, the only usable angle is the
//! direction of the step between consecutive accepted points. That
//! tangent runs a quarter turn ahead of the position angle, and when
//! it swings from quadrant 3 into quadrant 2 the trajectory has passed
//! the bottom of its loop: one pulse. Pulses found this way report
//! `first: true`.
//!
//! Once enough angular coverage confirms a least-squares fit, the
//! angle from the fitted centre takes over. It is insensitive to the
//! spacing of accepted points and keeps working at very slow flow.
//! Quadrant tracking is done by difference so that a quadrant skipped
//! entirely (a rejected sample at the wrong moment) still counts as
//! passing.
//!
//! In both regimes the search is re-armed only at the top of the
//! ellipse. Noise jitters the signal along X near the bottom, and a
//! detector that re-armed immediately would count the same bottom
//! crossing twice. Arming at the opposite side makes the decision
//! points maximally far apart.
//!
//! ## Drift
//!
//! Points that are beyond twice the noise distance from the confirmed
//! ellipse are outliers. A run of [`MAX_CONSECUTIVE_OUTLIERS`] of them
//! means the sensor moved or its bias jumped: the detector reports
//! `Drifted` and restarts measurement from scratch. Pulses are never
//! backfilled across a drift reset.
//!
//! ## Resource model
//!
//! One detector instance owns everything it needs: the filter ring,
//! the fitter buffer and a fixed set of scalars. Processing a sample
//! is a handful of float operations, plus one bounded least-squares
//! solve each time the fitter buffer fills. Nothing allocates; the
//! detector is `no_std` and single-threaded by contract, with the
//! caller serialising samples.

use crate::constants::{
    DEFAULT_NOISE_RANGE, MAX_CONSECUTIVE_OUTLIERS, MIN_CYCLE_FOR_FIT,
    MOVING_AVERAGE_NOISE_REDUCTION, MOVING_AVERAGE_SIZE,
};
use crate::ellipse::Ellipse;
use crate::events::{Event, EventBuffer};
use crate::filter::MovingAverage;
use crate::fit::EllipseFit;
use crate::geometry::{Angle, Coordinate};
use crate::math;
use crate::sample::{Sample, SampleState};

use core::f64::consts::TAU;

#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {{}};
}

/// Did the trajectory just pass the top of the ellipse?
///
/// A difference of 2 covers a quadrant skipped because the sample in
/// it was rejected.
fn passed_top(quadrant: u8, difference: u8) -> bool {
    (difference == 1 && quadrant == 1) || (difference == 2 && (quadrant == 1 || quadrant == 4))
}

/// Did the trajectory just pass the bottom of the ellipse?
fn passed_bottom(quadrant: u8, difference: u8) -> bool {
    (difference == 1 && quadrant == 3) || (difference == 2 && (quadrant == 3 || quadrant == 2))
}

/// The flow cycle detector.
///
/// Feed it raw samples through [`process`](Self::process) and drain
/// the event buffer after every call. All other methods observe the
/// per-sample result latches or the confirmed ellipse.
///
/// Not thread-safe; the caller serialises all access.
#[derive(Debug)]
pub struct FlowDetector {
    distance_threshold: f64,
    filter: MovingAverage<MOVING_AVERAGE_SIZE>,
    fitter: EllipseFit,
    confirmed_fit: Option<Ellipse>,

    first_call: bool,
    first_round: bool,
    just_started: bool,
    searching_for_pulse: bool,

    start_point: Coordinate,
    reference_point: Coordinate,
    previous_point: Coordinate,
    latest_average: Coordinate,

    start_tangent: Angle,
    previous_tangent_angle: Angle,
    previous_angle_with_center: Angle,
    previous_quadrant: u8,

    tangent_distance: f64,
    angle_distance: f64,

    wait_count: u32,
    consecutive_outliers: u32,

    found_pulse: bool,
    found_anomaly: bool,
    was_skipped: bool,
    was_reset: bool,
}

impl FlowDetector {
    /// Create a detector with the default noise range.
    pub fn new() -> Self {
        let mut detector = Self {
            distance_threshold: 0.0,
            filter: MovingAverage::new(),
            fitter: EllipseFit::new(),
            confirmed_fit: None,
            first_call: true,
            first_round: true,
            just_started: true,
            searching_for_pulse: true,
            start_point: Coordinate::new(0.0, 0.0),
            reference_point: Coordinate::new(0.0, 0.0),
            previous_point: Coordinate::new(0.0, 0.0),
            latest_average: Coordinate::new(f64::NAN, f64::NAN),
            start_tangent: Angle::ZERO,
            previous_tangent_angle: Angle::ZERO,
            previous_angle_with_center: Angle::ZERO,
            previous_quadrant: 0,
            tangent_distance: 0.0,
            angle_distance: 0.0,
            wait_count: 0,
            consecutive_outliers: 0,
            found_pulse: false,
            found_anomaly: false,
            was_skipped: false,
            was_reset: true,
        };
        detector.begin(DEFAULT_NOISE_RANGE);
        detector
    }

    /// Configure the per-sensor noise range (raw counts per axis).
    ///
    /// Two filtered points closer than `sqrt(2) * noise_range / 2` are
    /// considered the same point: the worst-case noise step on both
    /// axes combined, after the moving average has reduced it.
    pub fn begin(&mut self, noise_range: u16) {
        let range = f64::from(noise_range);
        self.distance_threshold =
            math::sqrt(2.0 * range * range) / MOVING_AVERAGE_NOISE_REDUCTION;
    }

    /// Process one raw sample, appending any resulting events.
    ///
    /// Runs to completion; events for this sample are in `out` when it
    /// returns, in detection order.
    pub fn process(&mut self, sample: Sample, out: &mut EventBuffer) {
        self.found_pulse = false;
        self.found_anomaly = false;
        self.was_skipped = false;

        let state = sample.state();
        if state != SampleState::Ok {
            self.report_anomaly(state, 0.0, out);
            return;
        }

        self.was_reset = self.first_call;
        if self.first_call {
            // A zero sample during startup is the sensor still warming
            // up, not a measurement.
            if sample.x == 0 && sample.y == 0 {
                self.report_anomaly(SampleState::FlatLine, 0.0, out);
                return;
            }
            self.filter.restart();
            self.first_round = true;
            self.first_call = false;
        }

        match self.filter.push(sample) {
            Some(point) => {
                self.latest_average = point;
                self.process_filtered(point, out);
            }
            None => self.was_skipped = true,
        }
    }

    /// External notification that the sensor itself was reset.
    ///
    /// All accumulated geometry belongs to the old sensor state and is
    /// discarded.
    pub fn sensor_was_reset(&mut self) {
        self.reset_measurement();
    }

    /// Forget everything learned since the last (re)start.
    ///
    /// The filter ring is not cleared here; the next Ok sample runs
    /// the first-call path, which rewinds the ring and gates output
    /// until it has refilled.
    pub fn reset_measurement(&mut self) {
        self.first_call = true;
        self.was_reset = true;
        self.just_started = true;
        self.consecutive_outliers = 0;
        self.confirmed_fit = None;
    }

    /// Whether the last processed sample completed a revolution.
    pub fn found_pulse(&self) -> bool {
        self.found_pulse
    }

    /// Whether the last processed sample was reported as an anomaly.
    pub fn found_anomaly(&self) -> bool {
        self.found_anomaly
    }

    /// Whether the last processed sample was discarded without
    /// advancing detection.
    pub fn was_skipped(&self) -> bool {
        self.was_skipped
    }

    /// Whether measurement state is fresh (no Ok sample since the last
    /// construction or reset).
    pub fn was_reset(&self) -> bool {
        self.was_reset
    }

    /// Whether the pulse search is armed (waiting for the bottom of
    /// the ellipse rather than for the top).
    pub fn is_searching(&self) -> bool {
        self.searching_for_pulse
    }

    /// The most recent filtered point.
    pub fn moving_average(&self) -> Coordinate {
        self.latest_average
    }

    /// The confirmed ellipse, if a fit has been promoted since the
    /// last reset.
    pub fn confirmed_ellipse(&self) -> Option<&Ellipse> {
        self.confirmed_fit.as_ref()
    }

    /// Confirmed ellipse centre in tenths of a count, zero when no fit
    /// is confirmed.
    pub fn ellipse_center_times10(&self) -> Sample {
        match &self.confirmed_fit {
            Some(ellipse) => Sample::times_10(ellipse.center.x, ellipse.center.y),
            None => Sample::new(0, 0),
        }
    }

    /// Confirmed ellipse radii in tenths of a count, zero when no fit
    /// is confirmed.
    pub fn ellipse_radius_times10(&self) -> Sample {
        match &self.confirmed_fit {
            Some(ellipse) => Sample::times_10(ellipse.radius.x, ellipse.radius.y),
            None => Sample::new(0, 0),
        }
    }

    /// Confirmed ellipse rotation in tenths of a degree, zero when no
    /// fit is confirmed.
    pub fn ellipse_angle_times10(&self) -> i16 {
        match &self.confirmed_fit {
            Some(ellipse) => ellipse.angle.degrees_times_10(),
            None => 0,
        }
    }

    /// Drive the detector with an already-filtered point.
    ///
    /// This is the pipeline below the moving average; tests use it to
    /// place points exactly.
    pub(crate) fn process_filtered(&mut self, point: Coordinate, out: &mut EventBuffer) {
        if self.first_round {
            // First filtered point since (re)start: anchor everything
            // here and start collecting.
            self.fitter.begin();
            self.start_point = point;
            self.reference_point = point;
            self.previous_point = point;
            self.first_round = false;
            self.was_skipped = true;
            return;
        }

        if !self.is_relevant(point, out) {
            self.found_pulse = false;
            if self.consecutive_outliers > 0
                && self.consecutive_outliers % MAX_CONSECUTIVE_OUTLIERS == 0
            {
                log_warn!(
                    "sensor drift: {} consecutive outliers, restarting measurement",
                    self.consecutive_outliers
                );
                out.push(Event::Drifted {
                    count: self.consecutive_outliers,
                });
                self.reset_measurement();
            }
            return;
        }

        self.consecutive_outliers = 0;
        self.detect_pulse(point, out);

        self.fitter.add(point);
        if self.fitter.is_full() {
            self.update_fit(point, out);
        }
        self.previous_point = point;
        self.was_skipped = false;
    }

    /// Relevance filter: decide whether a filtered point advances the
    /// measurement. Rejections mark the sample skipped and may report
    /// an outlier.
    fn is_relevant(&mut self, point: Coordinate, out: &mut EventBuffer) -> bool {
        // Within noise distance of the last accepted point: same point.
        if point.distance_from(&self.reference_point) < self.distance_threshold {
            self.was_skipped = true;
            return false;
        }

        // Too far from the confirmed ellipse: outlier.
        let ellipse_distance = self
            .confirmed_fit
            .as_ref()
            .map(|ellipse| ellipse.distance_from(&point));
        if let Some(distance) = ellipse_distance {
            if distance > self.distance_threshold * 2.0 {
                self.report_anomaly(SampleState::Outlier, distance, out);
                self.consecutive_outliers += 1;
                return false;
            }
        }

        if self.is_starting_up(point) {
            return false;
        }

        self.reference_point = point;
        true
    }

    /// Right after a (re)start the moving average may still carry mains
    /// ripple. Sit out one window's worth of candidate points, then
    /// latch the starting tangent.
    fn is_starting_up(&mut self, point: Coordinate) -> bool {
        if !self.just_started {
            return false;
        }
        self.wait_count += 1;
        if self.wait_count <= MOVING_AVERAGE_SIZE as u32 {
            self.was_skipped = true;
            return true;
        }
        self.start_tangent = point.angle_from(&self.start_point);
        self.just_started = false;
        self.wait_count = 0;
        false
    }

    fn detect_pulse(&mut self, point: Coordinate, out: &mut EventBuffer) {
        let confirmed_center = self.confirmed_fit.as_ref().map(|ellipse| ellipse.center);
        match confirmed_center {
            Some(center) => self.find_pulse_by_center(point, center, out),
            None => self.find_pulse_by_previous(point, out),
        }
    }

    /// Post-fit pulse detection from the angle about the fitted
    /// centre.
    fn find_pulse_by_center(
        &mut self,
        point: Coordinate,
        center: Coordinate,
        out: &mut EventBuffer,
    ) {
        let angle_with_center = point.angle_from(&center);
        let quadrant = angle_with_center.quadrant();
        let quadrant_difference = (self.previous_quadrant + 4 - quadrant) % 4;

        // Initialised when the fit was promoted, so always valid here.
        self.angle_distance += (angle_with_center - self.previous_angle_with_center).radians();

        if !self.searching_for_pulse {
            self.found_pulse = false;
            if passed_top(quadrant, quadrant_difference) {
                self.searching_for_pulse = true;
            }
        } else {
            self.found_pulse = passed_bottom(quadrant, quadrant_difference);
            if self.found_pulse {
                out.push(Event::Pulse { first: false });
                self.searching_for_pulse = false;
            }
        }

        self.previous_quadrant = quadrant;
        self.previous_angle_with_center = angle_with_center;
    }

    /// Pre-fit pulse detection from the inter-point step direction.
    fn find_pulse_by_previous(&mut self, point: Coordinate, out: &mut EventBuffer) {
        let step_angle = point.angle_from(&self.previous_point);
        let tangent_angle = step_angle - self.start_tangent;
        self.tangent_distance += (tangent_angle - self.previous_tangent_angle).radians();
        self.previous_tangent_angle = tangent_angle;

        let quadrant = step_angle.quadrant();

        // The step direction is jittery, so count once per crossing
        // and only re-arm on the other side of the loop.
        self.found_pulse =
            self.searching_for_pulse && quadrant == 2 && self.previous_quadrant == 3;
        if self.found_pulse {
            out.push(Event::Pulse { first: true });
            self.searching_for_pulse = false;
        }

        if !self.searching_for_pulse && (quadrant == 1 || quadrant == 4) {
            self.searching_for_pulse = true;
        }
        self.previous_quadrant = quadrant;
    }

    /// The fitter buffer just filled: run or skip a fit according to
    /// the accumulated angular coverage.
    fn update_fit(&mut self, point: Coordinate, out: &mut EventBuffer) {
        if self.confirmed_fit.is_none() {
            self.run_first_fit(point, out);
        } else {
            self.run_next_fit(out);
        }
    }

    /// First fit since (re)start. Promote only if the solve succeeded
    /// and the points cover enough of a revolution to pin the shape
    /// down.
    fn run_first_fit(&mut self, point: Coordinate, out: &mut EventBuffer) {
        let passed_cycles = self.tangent_distance / TAU;
        match self.fitter.fit() {
            Ok(ellipse) if math::abs(passed_cycles) >= MIN_CYCLE_FOR_FIT => {
                self.previous_angle_with_center = point.angle_from(&ellipse.center);
                self.previous_quadrant = self.previous_angle_with_center.quadrant();
                self.confirmed_fit = Some(ellipse);
            }
            Ok(_) => {
                // Valid parameters, not enough coverage: another round.
                out.push(Event::no_fit(self.tangent_distance, true));
            }
            Err(_) => {
                out.push(Event::no_fit(self.tangent_distance, false));
            }
        }
        self.tangent_distance = 0.0;
    }

    /// Re-fit with fresh points. The ellipse centre wanders a little
    /// with bias drift, so a new fit is only worth taking when the new
    /// points cover enough of a cycle on their own; otherwise the old
    /// one stays.
    fn run_next_fit(&mut self, out: &mut EventBuffer) {
        if math::abs(self.angle_distance / TAU) > MIN_CYCLE_FOR_FIT {
            match self.fitter.fit() {
                Ok(ellipse) => self.confirmed_fit = Some(ellipse),
                Err(_) => {
                    out.push(Event::no_fit(self.angle_distance, false));
                }
            }
        } else {
            // Reported as succeeded to tell "not enough new data"
            // apart from a failed solve.
            out.push(Event::no_fit(self.angle_distance, true));
            self.fitter.begin();
        }
        self.angle_distance = 0.0;
    }

    fn report_anomaly(&mut self, state: SampleState, distance: f64, out: &mut EventBuffer) {
        self.found_anomaly = true;
        self.was_skipped = true;
        out.push(Event::anomaly(state, distance));
    }
}

impl Default for FlowDetector {
    fn default() -> Self {
        Self::new()
    }
}
