//! FlowSense Core - Magnetometer-Based Flow Cycle Detection
//!
//! ## Overview
//!
//! FlowSense Core measures water flow without touching the water. A
//! magnet on the meter's impeller rotates once per unit of volume, and
//! a two-axis magnetometer sampled at 100 Hz sees that rotation as a
//! noisy clockwise ellipse in the X-Y plane. This crate turns the raw
//! sample stream into one pulse event per revolution, online, with
//! fixed memory.
//!
//! The hard part is that nothing about the signal is absolute. The DC
//! bias drifts with temperature, mains wiring couples into the sensor,
//! rotation can be arbitrarily slow or fast, and the sensor sometimes
//! reports garbage. The detector deals with each in turn:
//!
//! - a boxcar filter cancels mains coupling and halves sensor noise,
//! - a relevance filter drops points that are just noise around the
//!   previous point, so slow flow still produces clean geometry,
//! - a least-squares ellipse fit learns the trajectory and flags
//!   points that do not belong to it,
//! - a drift monitor notices when the fit has stopped describing
//!   reality and starts the measurement over.
//!
//! ## Architecture
//!
//! ```text
//! Sample ──→ ingress gate ──→ boxcar ──→ relevance ──→ pulse detector
//!               │                           │              │
//!            Anomaly                     Anomaly         Pulse
//!               │                           │              │
//!               ▼                           ▼              ▼
//!          ┌────────────────────────────────────────────────┐
//!          │                  EventBuffer                   │
//!          └────────────────────────────────────────────────┘
//! ```
//!
//! The detector is a pure function of state and input: it owns all of
//! its state exclusively, emits events by value and holds no locks.
//! Callers serialise samples into [`FlowDetector::process`] and drain
//! the event buffer after each call.
//!
//! ## Memory model
//!
//! Everything is sized at compile time:
//!
//! ```text
//! FlowDetector
//! ├── moving average ring: 4 raw samples
//! ├── ellipse fitter buffer: 32 points
//! └── scalars: flags, angles, accumulators
//! ```
//!
//! No heap allocation happens on the sample path, ever. The crate is
//! `no_std` out of the box; the `std` feature only switches float
//! intrinsics and error trait plumbing.
//!
//! ## Quick start
//!
//! ```
//! use flowsense_core::{EventBuffer, Event, FlowDetector, Sample};
//!
//! let mut detector = FlowDetector::new();
//! detector.begin(3); // per-sensor noise range, raw counts
//!
//! let mut events = EventBuffer::new();
//! for sample in sensor_samples() {
//!     detector.process(sample, &mut events);
//!     for event in events.take() {
//!         if let Event::Pulse { .. } = event {
//!             // one revolution, one unit of volume
//!         }
//!     }
//! }
//! # fn sensor_samples() -> impl Iterator<Item = Sample> {
//! #     core::iter::empty()
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `std` (default): standard library float intrinsics and error
//!   formatting
//! - `log`: diagnostics through the `log` facade
//! - `defmt`: event and error formatting for embedded logging
//! - `serde`: serialization of the public data types

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod constants;
pub mod detector;
pub mod ellipse;
pub mod events;
pub mod filter;
pub mod fit;
pub mod geometry;
pub mod sample;
pub mod stream;

mod math;

pub use detector::FlowDetector;
pub use ellipse::Ellipse;
pub use events::{Event, EventBuffer};
pub use filter::MovingAverage;
pub use fit::{EllipseFit, FitError};
pub use geometry::{Angle, Coordinate};
pub use sample::{Sample, SampleState};
pub use stream::{MemoryStream, SampleStream, StreamError};

/// Crate version, for telemetry and runtime checks.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
