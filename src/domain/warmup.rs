// Synthetic placeholder history so a live chart never starts empty
use super::telemetry::Sample;
use rand::Rng;

pub const DEFAULT_COUNT: usize = 30;
pub const DEFAULT_SPACING_MS: i64 = 2_000;
pub const DEFAULT_JITTER_FRACTION: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarmupGenerator {
    pub count: usize,
    pub spacing_ms: i64,
    pub jitter_fraction: f64,
    /// Lowest plausible value for the metric.
    pub floor: f64,
    pub ceiling: Option<f64>,
}

impl Default for WarmupGenerator {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT,
            spacing_ms: DEFAULT_SPACING_MS,
            jitter_fraction: DEFAULT_JITTER_FRACTION,
            floor: 0.0,
            ceiling: None,
        }
    }
}

impl WarmupGenerator {
    /// Produce exactly `count` samples spaced `spacing_ms` apart, ending at
    /// `end_time`, each within `±jitter_fraction * seed` of `seed`.
    pub fn generate(&self, seed: f64, end_time: i64) -> Vec<Sample> {
        let mut rng = rand::rng();
        let seed = if seed.is_finite() { seed } else { self.floor };
        let amplitude = if self.jitter_fraction.is_finite() {
            (self.jitter_fraction.abs() * seed).abs()
        } else {
            0.0
        };
        let spacing = self.spacing_ms.max(0);

        (0..self.count)
            .map(|i| {
                let steps_back = (self.count - 1 - i) as i64;
                let timestamp = end_time.saturating_sub(steps_back.saturating_mul(spacing));
                let jittered = seed + amplitude * rng.random_range(-1.0f64..=1.0);
                let value = if jittered.is_finite() { jittered } else { seed };
                Sample::new(timestamp, self.clamp(value))
            })
            .collect()
    }

    fn clamp(&self, value: f64) -> f64 {
        let value = value.max(self.floor);
        match self.ceiling {
            Some(ceiling) if ceiling >= self.floor => value.min(ceiling),
            _ => value,
        }
    }
}
