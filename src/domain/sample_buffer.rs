// Fixed-capacity ring buffer of recent samples for one metric
use super::telemetry::Sample;
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 15;

#[derive(Debug, Clone)]
pub struct SampleBuffer {
    capacity: usize,
    samples: VecDeque<Sample>,
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SampleBuffer {
    /// A capacity of zero is bumped to one so the buffer can always hold the
    /// latest sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a sample, evicting the oldest one once `capacity` is exceeded.
    /// Samples with a non-finite value are dropped and `false` is returned.
    pub fn push(&mut self, sample: Sample) -> bool {
        if !sample.is_finite() {
            return false;
        }

        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        true
    }

    pub fn extend<I: IntoIterator<Item = Sample>>(&mut self, samples: I) {
        for sample in samples {
            self.push(sample);
        }
    }

    /// Current contents, oldest first.
    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Sample> + '_ {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retains_last_capacity_samples_in_order() {
        for pushes in [0usize, 1, 14, 15, 16, 40] {
            let mut buffer = SampleBuffer::new(15);
            for i in 0..pushes {
                buffer.push(Sample::new(i as i64, i as f64));
            }

            let contents = buffer.to_vec();
            assert_eq!(contents.len(), pushes.min(15));

            let expected: Vec<i64> = (pushes.saturating_sub(15)..pushes).map(|i| i as i64).collect();
            let actual: Vec<i64> = contents.iter().map(|s| s.timestamp).collect();
            assert_eq!(actual, expected);
        }
    }

    #[test]
    fn test_empty_buffer_returns_empty_vec() {
        let buffer = SampleBuffer::default();
        assert!(buffer.to_vec().is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_non_finite_samples_are_dropped() {
        let mut buffer = SampleBuffer::new(3);
        assert!(buffer.push(Sample::new(1, 1.0)));
        assert!(!buffer.push(Sample::new(2, f64::NAN)));
        assert!(!buffer.push(Sample::new(3, f64::INFINITY)));

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.to_vec(), vec![Sample::new(1, 1.0)]);
    }

    #[test]
    fn test_zero_capacity_holds_latest() {
        let mut buffer = SampleBuffer::new(0);
        buffer.push(Sample::new(1, 1.0));
        buffer.push(Sample::new(2, 2.0));

        assert_eq!(buffer.to_vec(), vec![Sample::new(2, 2.0)]);
    }

    #[test]
    fn test_clear() {
        let mut buffer = SampleBuffer::new(4);
        buffer.extend((0..4).map(|i| Sample::new(i, 1.0)));
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
