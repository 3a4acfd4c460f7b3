//! Mixer: sums everything routed to the destination, one block at a time.

/// Accumulates destination samples for a render block.
#[derive(Debug, Clone, Default)]
pub struct Mixer {
    buffer: Vec<f64>,
}

impl Mixer {
    pub fn new() -> Self {
        Mixer { buffer: Vec::new() }
    }

    /// Prepare a buffer of `num_samples` filled with zeros.
    pub fn clear(&mut self, num_samples: usize) {
        self.buffer.clear();
        self.buffer.resize(num_samples, 0.0);
    }

    pub fn add(&mut self, index: usize, sample: f64) {
        if let Some(slot) = self.buffer.get_mut(index) {
            *slot += sample;
        }
    }

    /// Write the block, soft-clipped, into `out`.
    pub fn write_to(&self, out: &mut [f32]) {
        for (dst, &s) in out.iter_mut().zip(&self.buffer) {
            *dst = soft_clip(s) as f32;
        }
    }
}

/// tanh keeps several full-scale voices from hard clipping.
fn soft_clip(x: f64) -> f64 {
    x.tanh()
}
