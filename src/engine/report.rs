// Timing & Report
use std::fmt;
use std::time::{Duration, Instant};

/// Monotonic readings bracketing a single region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSample {
    pub start: Instant,
    pub end: Instant,
}

impl TimingSample {
    /// Closes a sample opened at `start`.
    pub fn finish(start: Instant) -> Self {
        Self {
            start,
            end: Instant::now(),
        }
    }

    /// Never negative: `Instant` is monotonic and this saturates at zero.
    pub fn elapsed(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }
}

/// What a finished run prints: elapsed seconds, result length and a spot-check element.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub elapsed: Duration,
    pub len: usize,
    /// Element at `len / 2`; absent for an empty result.
    pub sample: Option<f64>,
}

impl Report {
    /// Must only be called on a result whose parallel region has joined.
    pub fn from_result(timing: &TimingSample, result: &[f64]) -> Self {
        Self {
            elapsed: timing.elapsed(),
            len: result.len(),
            sample: result.get(result.len() / 2).copied(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn sample_index(&self) -> usize {
        self.len / 2
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Work took {:.6} seconds", self.elapsed_secs())?;
        writeln!(f, "Size of resulting vector: {}", self.len)?;
        match self.sample {
            Some(value) => write!(f, "Example element from resulting vector: {}", value),
            None => write!(f, "Example element from resulting vector: n/a"),
        }
    }
}
