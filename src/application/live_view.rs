// Live view - Turns the 1 Hz push feed into smoothed, bounded chart traces
use crate::domain::error::TelemetryError;
use crate::domain::sample_buffer::SampleBuffer;
use crate::domain::smoother::Smoother;
use crate::domain::telemetry::{LiveSampleEvent, RenderSeries, Sample};
use crate::domain::warmup::WarmupGenerator;
use crate::infrastructure::config::{DisplaySettings, FamilyConfig};
use std::collections::HashMap;

struct LiveMetric {
    /// Raw samples feeding the smoother.
    raw: SampleBuffer,
    /// Smoothed points shown on the chart, seeded with warm-up data.
    trace: SampleBuffer,
    warmup: WarmupGenerator,
}

/// Live state for every metric of one family. Owned by a single view.
pub struct LiveView {
    metrics: HashMap<String, LiveMetric>,
    smoother: Smoother,
}

impl LiveView {
    pub fn new(family: &FamilyConfig, display: &DisplaySettings) -> Self {
        let metrics = family
            .metrics
            .iter()
            .map(|m| {
                let metric = LiveMetric {
                    raw: SampleBuffer::new(display.buffer_capacity),
                    trace: SampleBuffer::new(display.live_window),
                    warmup: m.warmup(display),
                };
                (m.name.clone(), metric)
            })
            .collect();

        Self {
            metrics,
            smoother: Smoother::new(display.smoothing_base),
        }
    }

    /// Replace the trace with warm-up data around `seed_value`, ending at
    /// `end_time`. Unknown metrics yield `None`.
    pub fn seed(&mut self, metric_name: &str, seed_value: f64, end_time: i64) -> Option<RenderSeries> {
        let metric = self.metrics.get_mut(metric_name)?;
        metric.trace.clear();
        metric.trace.extend(metric.warmup.generate(seed_value, end_time));
        Some(RenderSeries::from_samples(metric_name, metric.trace.to_vec()))
    }

    /// Route one feed event to its metric and emit the updated trace.
    pub fn ingest(&mut self, event: &LiveSampleEvent) -> Result<Option<RenderSeries>, TelemetryError> {
        if !event.value.is_finite() {
            return Err(TelemetryError::MalformedSample {
                metric: event.metric_name.clone(),
                value: event.value,
            });
        }

        let Some(metric) = self.metrics.get_mut(&event.metric_name) else {
            tracing::debug!("Ignoring live sample for unknown metric {}", event.metric_name);
            return Ok(None);
        };

        if metric.trace.is_empty() {
            let spacing = metric.warmup.spacing_ms;
            let end = event.timestamp.saturating_sub(spacing);
            metric.trace.extend(metric.warmup.generate(event.value, end));
        }

        metric.raw.push(event.sample());
        let smoothed = self.smoother.smooth(&metric.raw);
        metric.trace.push(Sample::new(event.timestamp, smoothed));

        Ok(Some(RenderSeries::from_samples(
            event.metric_name.as_str(),
            metric.trace.to_vec(),
        )))
    }

    /// Latest smoothed value for a metric.
    pub fn current_value(&self, metric_name: &str) -> Option<f64> {
        let metric = self.metrics.get(metric_name)?;
        (!metric.raw.is_empty()).then(|| self.smoother.smooth(&metric.raw))
    }

    /// Discard all live history.
    pub fn reset(&mut self) {
        for metric in self.metrics.values_mut() {
            metric.raw.clear();
            metric.trace.clear();
        }
    }
}
