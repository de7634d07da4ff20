//! Sample Sources for Replay and Testing
//!
//! ## Overview
//!
//! Live deployments feed the detector straight from the sensor driver,
//! but analysis and testing want to replay recorded sample vectors
//! through the exact same path. This module provides the small source
//! abstraction both sides share.
//!
//! The trait uses the `nb` non-blocking pattern instead of async:
//! `WouldBlock` means "no sample yet, poll again", which maps directly
//! onto interrupt-driven drivers and polling loops without a runtime.

use crate::sample::Sample;

/// Error produced by sample sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    /// The source has no further samples.
    EndOfStream,
}

/// A source of raw sensor samples.
pub trait SampleStream {
    /// Poll for the next sample.
    ///
    /// - `Ok(sample)`: a sample is ready.
    /// - `Err(nb::Error::WouldBlock)`: nothing yet, poll again.
    /// - `Err(nb::Error::Other(_))`: the source is exhausted or broken.
    fn poll_next(&mut self) -> nb::Result<Sample, StreamError>;

    /// Bounds on the number of remaining samples, if known.
    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, None)
    }
}

/// Replays a recorded slice of samples.
#[derive(Debug, Clone)]
pub struct MemoryStream<'a> {
    samples: &'a [Sample],
    position: usize,
}

impl<'a> MemoryStream<'a> {
    /// Create a stream over recorded samples.
    pub const fn new(samples: &'a [Sample]) -> Self {
        Self {
            samples,
            position: 0,
        }
    }

    /// Samples consumed so far.
    pub const fn position(&self) -> usize {
        self.position
    }
}

impl SampleStream for MemoryStream<'_> {
    fn poll_next(&mut self) -> nb::Result<Sample, StreamError> {
        match self.samples.get(self.position) {
            Some(sample) => {
                self.position += 1;
                Ok(*sample)
            }
            None => Err(nb::Error::Other(StreamError::EndOfStream)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.samples.len() - self.position;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_in_order_then_ends() {
        let samples = [Sample::new(1, 2), Sample::new(3, 4)];
        let mut stream = MemoryStream::new(&samples);
        assert_eq!(stream.size_hint(), (2, Some(2)));
        assert_eq!(stream.poll_next().unwrap(), Sample::new(1, 2));
        assert_eq!(stream.poll_next().unwrap(), Sample::new(3, 4));
        assert!(matches!(
            stream.poll_next(),
            Err(nb::Error::Other(StreamError::EndOfStream))
        ));
        assert_eq!(stream.position(), 2);
    }
}
