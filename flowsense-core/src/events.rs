//! Detector Output Events
//!
//! ## Overview
//!
//! The detector communicates exclusively through a small set of
//! events. Each variant carries its own payload, so consumers match
//! on the enum instead of decoding dynamically typed bus payloads.
//! Event values are `Copy` and a handful of bytes each; they transfer
//! by value and never borrow detector state.
//!
//! ## Event flow
//!
//! ```text
//! Sample ──→ FlowDetector ──→ EventBuffer ──→ caller / host bus
//!                  │
//!                  └── at most a few events per processing step
//! ```
//!
//! The detector writes into an [`EventBuffer`] handed to every
//! processing call; the caller drains the buffer before offering the
//! next sample. That preserves the ordering guarantee that an event
//! caused by sample N is observable before any event caused by sample
//! N+1.
//!
//! ## Wire encodings
//!
//! Hosts ship events over constrained transports, so the payloads have
//! compact packed forms:
//!
//! - `Anomaly`: one `i16` with the sample state in the low 4 bits and
//!   the outlier distance (centi-counts, capped at 4095) in the high
//!   12 bits. Non-outlier anomalies carry distance 0.
//! - `NoFit`: one `i16`, `round(|angle| * 180)` with the sign encoding
//!   whether the fit itself succeeded (positive: valid parameters or
//!   not run for lack of coverage; negative: the solver failed).

use crate::constants::EVENT_BUFFER_CAPACITY;
use crate::math;
use crate::sample::SampleState;

/// Cap for the outlier distance reporter: 12 bits of centi-counts.
const MAX_REPORTED_DISTANCE: f64 = 4095.0;

/// One detector output event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Event {
    /// One complete clockwise revolution of the magnetic vector, equal
    /// to one unit of volumetric flow.
    ///
    /// `first` is true for pulses found before an ellipse fit is
    /// confirmed (the inaugural pulse of a measurement session) and
    /// false for every pulse found from the fitted centre.
    Pulse {
        /// Whether this pulse was detected in the pre-fit regime.
        first: bool,
    },
    /// A sample was rejected: a sensor-reported error, a saturated
    /// axis, a flatline, or a point too far from the confirmed
    /// ellipse.
    Anomaly {
        /// Classification of the rejected sample.
        state: SampleState,
        /// For outliers, the distance from the confirmed ellipse in
        /// hundredths of a count, capped at 4095. Zero otherwise.
        distance: u16,
    },
    /// The fitter ran out of buffer without producing a usable
    /// ellipse, either because the angular coverage was too small or
    /// because the solve failed.
    NoFit {
        /// Packed coverage angle, see the module docs for the sign
        /// convention.
        angle: i16,
    },
    /// Too many consecutive outliers: the sensor has drifted and the
    /// detector reset itself.
    Drifted {
        /// Number of consecutive outliers that triggered the reset.
        count: u32,
    },
}

impl Event {
    /// Build an anomaly event, converting an outlier distance into the
    /// capped centi-count reporter. Non-outlier states carry 0.
    pub(crate) fn anomaly(state: SampleState, distance: f64) -> Self {
        let reported = if state == SampleState::Outlier {
            let centi = math::round(distance * 100.0);
            if centi > MAX_REPORTED_DISTANCE {
                MAX_REPORTED_DISTANCE as u16
            } else {
                centi as u16
            }
        } else {
            0
        };
        Event::Anomaly {
            state,
            distance: reported,
        }
    }

    /// Build a fit report from the accumulated coverage angle.
    pub(crate) fn no_fit(angle_distance: f64, fit_succeeded: bool) -> Self {
        let magnitude = math::round(math::abs(angle_distance * 180.0));
        let clamped = if magnitude > f64::from(i16::MAX) {
            f64::from(i16::MAX)
        } else {
            magnitude
        };
        let angle = clamped as i16;
        Event::NoFit {
            angle: if fit_succeeded { angle } else { -angle },
        }
    }

    /// Packed `i16` form of an anomaly, for wire transport.
    ///
    /// Returns `None` for other event kinds.
    pub fn packed_anomaly(&self) -> Option<i16> {
        match self {
            Event::Anomaly { state, distance } => {
                Some(((*distance << 4) | (*state as u16 & 0xF)) as i16)
            }
            _ => None,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Event {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Event::Pulse { first } => defmt::write!(fmt, "pulse (first: {})", first),
            Event::Anomaly { state, distance } => {
                defmt::write!(fmt, "anomaly {} ({})", state, distance)
            }
            Event::NoFit { angle } => defmt::write!(fmt, "no fit ({})", angle),
            Event::Drifted { count } => defmt::write!(fmt, "drifted ({})", count),
        }
    }
}

/// Fixed-capacity output buffer for one processing step.
///
/// The capacity bounds how much a single step may emit; pushing past
/// it drops the event and reports `false`, which keeps the hot path
/// allocation-free and panic-free.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: heapless::Vec<Event, EVENT_BUFFER_CAPACITY>,
}

impl EventBuffer {
    /// Create an empty buffer.
    pub const fn new() -> Self {
        Self {
            events: heapless::Vec::new(),
        }
    }

    /// Append an event. Returns false if the buffer is full.
    pub fn push(&mut self, event: Event) -> bool {
        self.events.push(event).is_ok()
    }

    /// Events emitted so far, oldest first.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Take all buffered events, leaving the buffer empty.
    pub fn take(&mut self) -> heapless::Vec<Event, EVENT_BUFFER_CAPACITY> {
        core::mem::take(&mut self.events)
    }

    /// Discard all buffered events.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are buffered.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
