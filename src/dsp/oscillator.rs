//! Phase-accumulating sine oscillator.

use std::f64::consts::PI;

/// A pure sine source. Frequency may change between any two samples
/// without a phase jump.
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub frequency: f64,
    phase: f64,
    sample_rate: f64,
}

impl Oscillator {
    pub fn new(frequency: f64, sample_rate: f64) -> Self {
        Oscillator {
            frequency,
            phase: 0.0,
            sample_rate,
        }
    }

    /// Phase increment per sample.
    fn phase_inc(&self) -> f64 {
        self.frequency / self.sample_rate
    }

    /// Generate the next sample.
    pub fn next_sample(&mut self) -> f64 {
        let sample = (2.0 * PI * self.phase).sin();
        self.phase = (self.phase + self.phase_inc()).rem_euclid(1.0);
        sample
    }
}
