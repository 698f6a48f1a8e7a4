// Time-bucketed downsampling of historical series
use super::telemetry::Sample;
use std::collections::BTreeMap;

pub const DEFAULT_THRESHOLD: usize = 250;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;

/// Bucket width for a series spanning `duration_ms`.
pub fn bucket_width_for(duration_ms: i64) -> i64 {
    if duration_ms <= 2 * HOUR_MS {
        MINUTE_MS
    } else if duration_ms <= 12 * HOUR_MS {
        5 * MINUTE_MS
    } else {
        15 * MINUTE_MS
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    threshold: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl Aggregator {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Downsample `points` into bucket-midpoint averages once the series is
    /// longer than the threshold. Shorter series are returned unchanged.
    ///
    /// Buckets are aligned to multiples of the bucket width and empty buckets
    /// are omitted. Non-finite values do not contribute to any bucket.
    pub fn aggregate(&self, points: &[Sample]) -> Vec<Sample> {
        if points.len() <= self.threshold {
            return points.to_vec();
        }

        let mut sorted = points.to_vec();
        sorted.sort_by_key(|p| p.timestamp);

        let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
            return Vec::new();
        };
        let bucket_width = bucket_width_for(last.timestamp.saturating_sub(first.timestamp));

        // bucket start -> (sum, count)
        let mut buckets: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
        for point in sorted.iter().filter(|p| p.is_finite()) {
            let bucket_start = point
                .timestamp
                .saturating_sub(point.timestamp.rem_euclid(bucket_width));
            let entry = buckets.entry(bucket_start).or_insert((0.0, 0));
            entry.0 += point.value;
            entry.1 += 1;
        }

        buckets
            .into_iter()
            .map(|(bucket_start, (sum, count))| {
                Sample::new(bucket_start.saturating_add(bucket_width / 2), sum / count as f64)
            })
            .collect()
    }
}
