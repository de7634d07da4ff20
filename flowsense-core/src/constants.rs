//! Compile-Time Tuning Constants
//!
//! All detector tuning lives here so the relationships between the
//! numbers stay visible in one place. Values are chosen for a 100 Hz
//! sample rate (twice the 50 Hz mains frequency, so mains coupling
//! lands on alternating samples and averages out).

/// Number of raw samples in the boxcar moving average.
///
/// Four samples at 100 Hz span two mains periods' worth of coupling
/// and reduce uncorrelated sensor noise by a factor of sqrt(4) = 2.
pub const MOVING_AVERAGE_SIZE: usize = 4;

/// Noise reduction factor of the moving average: sqrt(MOVING_AVERAGE_SIZE).
pub const MOVING_AVERAGE_NOISE_REDUCTION: f64 = 2.0;

/// Consecutive outliers that trigger a drift reset.
///
/// 50 outliers at 100 Hz is half a second of points that do not match
/// the confirmed ellipse. At that point the sensor has most likely
/// been moved or its bias has shifted, and the accumulated geometry
/// is worthless.
pub const MAX_CONSECUTIVE_OUTLIERS: u32 = 50;

/// Minimum angular coverage, as a fraction of a full revolution,
/// required before a least-squares fit is trusted.
pub const MIN_CYCLE_FOR_FIT: f64 = 0.6;

/// Capacity of the ellipse fitter's point buffer. One fit is run per
/// buffer fill.
pub const FIT_BUFFER_SIZE: usize = 32;

/// Default sensor noise range (raw counts) used when the caller does
/// not configure one.
pub const DEFAULT_NOISE_RANGE: u16 = 3;

/// Events a single processing step can emit at most.
///
/// The worst cases are an outlier anomaly followed by a drift report,
/// and a pulse followed by a fit report. Capacity 4 leaves headroom.
pub const EVENT_BUFFER_CAPACITY: usize = 4;
