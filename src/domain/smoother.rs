// Recency-weighted averaging over a sample buffer
use super::sample_buffer::SampleBuffer;

pub const DEFAULT_BASE: f64 = 1.2;

/// Weighted mean with weight `base^i` for the i-th sample, oldest first.
#[derive(Debug, Clone, Copy)]
pub struct Smoother {
    base: f64,
}

impl Default for Smoother {
    fn default() -> Self {
        Self::new(DEFAULT_BASE)
    }
}

impl Smoother {
    /// Non-finite or non-positive bases fall back to the default.
    pub fn new(base: f64) -> Self {
        let base = if base.is_finite() && base > 0.0 {
            base
        } else {
            DEFAULT_BASE
        };
        Self { base }
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    /// Returns 0 for an empty buffer.
    pub fn smooth(&self, buffer: &SampleBuffer) -> f64 {
        let n = buffer.len();
        if n == 0 {
            return 0.0;
        }

        // Weights are scaled so the newest sample weighs 1; the ratio is unchanged.
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for (i, sample) in buffer.iter().enumerate() {
            let weight = self.base.powi(i as i32 - (n as i32 - 1));
            weighted_sum += sample.value * weight;
            weight_total += weight;
        }

        if weight_total > 0.0 {
            weighted_sum / weight_total
        } else {
            0.0
        }
    }
}
