// Repository traits for telemetry data access
use crate::domain::telemetry::Sample;
use async_trait::async_trait;

#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    /// Query a single value (latest reading for live polling and seeding)
    async fn query_single_value(&self, query: &str) -> anyhow::Result<Option<f64>>;

    /// Query an ordered time series (for historical charts)
    async fn query_time_series(&self, query: &str) -> anyhow::Result<Vec<Sample>>;
}

/// Answers "does at least one hour of continuous history exist for this
/// metric family".
#[async_trait]
pub trait HistoryProbe: Send + Sync {
    async fn has_sufficient_history(&self, family: &str) -> anyhow::Result<bool>;
}
