// Telemetry data domain models
use serde::{Deserialize, Serialize};

/// A single timestamped reading. Timestamps are epoch milliseconds in
/// local-time-equivalent form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }

    pub fn is_finite(&self) -> bool {
        self.value.is_finite()
    }
}

/// Event delivered by the live push feed, tagged with its family and metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSampleEvent {
    pub family: String,
    pub metric_name: String,
    pub value: f64,
    pub timestamp: i64,
}

impl LiveSampleEvent {
    pub fn new(
        family: impl Into<String>,
        metric_name: impl Into<String>,
        value: f64,
        timestamp: i64,
    ) -> Self {
        Self {
            family: family.into(),
            metric_name: metric_name.into(),
            value,
            timestamp,
        }
    }

    pub fn sample(&self) -> Sample {
        Sample::new(self.timestamp, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderPoint {
    pub x: i64,
    pub y: f64,
}

impl From<Sample> for RenderPoint {
    fn from(sample: Sample) -> Self {
        Self {
            x: sample.timestamp,
            y: sample.value,
        }
    }
}

/// Render-ready payload handed to the charting layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSeries {
    pub series_name: String,
    pub points: Vec<RenderPoint>,
}

impl RenderSeries {
    pub fn new(series_name: impl Into<String>, points: Vec<RenderPoint>) -> Self {
        Self {
            series_name: series_name.into(),
            points,
        }
    }

    pub fn from_samples<I>(series_name: impl Into<String>, samples: I) -> Self
    where
        I: IntoIterator<Item = Sample>,
    {
        Self::new(series_name, samples.into_iter().map(RenderPoint::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_series_serializes_camel_case() {
        let series = RenderSeries::from_samples("load_watts", vec![Sample::new(1_000, 42.5)]);
        let json = serde_json::to_value(&series).unwrap();

        assert_eq!(json["seriesName"], "load_watts");
        assert_eq!(json["points"][0]["x"], 1_000);
        assert_eq!(json["points"][0]["y"], 42.5);
    }

    #[test]
    fn test_live_event_deserializes() {
        let event: LiveSampleEvent =
            serde_json::from_str(r#"{"family":"battery","metricName":"battery_charge","value":98.0,"timestamp":5}"#)
                .unwrap();

        assert_eq!(event.family, "battery");
        assert_eq!(event.metric_name, "battery_charge");
        assert_eq!(event.sample(), Sample::new(5, 98.0));
    }
}
