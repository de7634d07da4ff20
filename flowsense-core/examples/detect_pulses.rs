//! Feed a synthetic flow signal through the detector and print what
//! comes out.
//!
//! ```bash
//! cargo run --example detect_pulses
//! ```

use flowsense_core::{Event, EventBuffer, FlowDetector, MemoryStream, Sample, SampleStream};

fn main() {
    // Five revolutions of a clockwise circle around a typical sensor
    // bias, 32 samples per revolution, like a meter running at about
    // three revolutions per second.
    let samples: Vec<Sample> = (0..5 * 32)
        .map(|k| {
            let angle = k as f64 * std::f64::consts::TAU / 32.0;
            Sample::new(
                (-100.0 + 20.0 * angle.sin()).round() as i16,
                (100.0 + 20.0 * angle.cos()).round() as i16,
            )
        })
        .collect();

    let mut detector = FlowDetector::new();
    detector.begin(3);

    let mut stream = MemoryStream::new(&samples);
    let mut events = EventBuffer::new();
    let mut pulses = 0u32;

    while let Ok(sample) = stream.poll_next() {
        detector.process(sample, &mut events);
        for event in events.take() {
            match event {
                Event::Pulse { first } => {
                    pulses += 1;
                    println!("pulse #{pulses} (first: {first})");
                }
                Event::Anomaly { state, distance } => {
                    println!("anomaly: {} (distance {distance})", state.name());
                }
                Event::NoFit { angle } => println!("no fit (angle {angle})"),
                Event::Drifted { count } => println!("drifted after {count} outliers"),
            }
        }
    }

    if let Some(ellipse) = detector.confirmed_ellipse() {
        println!(
            "confirmed ellipse: centre ({:.1}, {:.1}), radii ({:.1}, {:.1})",
            ellipse.center.x, ellipse.center.y, ellipse.radius.x, ellipse.radius.y
        );
    }
    println!("{pulses} pulses from {} samples", stream.position());
}
