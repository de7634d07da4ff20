//! Shared test harness: run sample vectors through a detector and
//! count what comes out, checking the per-step latch invariants along
//! the way.

pub mod generators;

use flowsense_core::{Event, EventBuffer, FlowDetector, Sample};

/// Event totals for one detector run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventCounts {
    pub first_pulses: u32,
    pub subsequent_pulses: u32,
    pub anomalies: u32,
    pub no_fits: u32,
    pub drifts: u32,
}

/// Feed `samples` through a fresh detector configured with
/// `noise_range`, returning the event totals.
pub fn run(samples: &[Sample], noise_range: u16) -> EventCounts {
    run_with_detector(samples, noise_range).1
}

/// Like [`run`], but also hands back the detector for post-run
/// inspection.
pub fn run_with_detector(samples: &[Sample], noise_range: u16) -> (FlowDetector, EventCounts) {
    let mut detector = FlowDetector::new();
    detector.begin(noise_range);
    let mut out = EventBuffer::new();
    let mut counts = EventCounts::default();

    for (index, sample) in samples.iter().enumerate() {
        detector.process(*sample, &mut out);

        // Per-step latch invariants: a pulse excludes the other
        // outcomes, an anomaly is always also skipped.
        assert!(
            !(detector.found_pulse() && detector.was_skipped()),
            "pulse and skipped latched together at sample {index}"
        );
        assert!(
            !(detector.found_pulse() && detector.found_anomaly()),
            "pulse and anomaly latched together at sample {index}"
        );
        if detector.found_anomaly() {
            assert!(
                detector.was_skipped(),
                "anomaly without skip at sample {index}"
            );
        }

        for event in out.take() {
            match event {
                Event::Pulse { first: true } => counts.first_pulses += 1,
                Event::Pulse { first: false } => counts.subsequent_pulses += 1,
                Event::Anomaly { .. } => counts.anomalies += 1,
                Event::NoFit { .. } => counts.no_fits += 1,
                Event::Drifted { .. } => counts.drifts += 1,
            }
        }
    }

    (detector, counts)
}
