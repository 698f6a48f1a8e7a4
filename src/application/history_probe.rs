// History-sufficiency probe backed by the telemetry store
use crate::application::telemetry_repository::{HistoryProbe, TelemetryRepository};
use crate::domain::error::TelemetryError;
use crate::infrastructure::config::MetricsConfig;
use async_trait::async_trait;
use std::sync::Arc;

/// Runs the family's `probe_query` (a sample count over the last hour) and
/// compares it against `min_history_samples`.
pub struct RepositoryHistoryProbe {
    repository: Arc<dyn TelemetryRepository>,
    metrics_config: Arc<MetricsConfig>,
}

impl RepositoryHistoryProbe {
    pub fn new(repository: Arc<dyn TelemetryRepository>, metrics_config: Arc<MetricsConfig>) -> Self {
        Self {
            repository,
            metrics_config,
        }
    }
}

#[async_trait]
impl HistoryProbe for RepositoryHistoryProbe {
    async fn has_sufficient_history(&self, family: &str) -> anyhow::Result<bool> {
        let config = self
            .metrics_config
            .family(family)
            .ok_or_else(|| TelemetryError::UnknownFamily(family.to_string()))?;

        let count = self
            .repository
            .query_single_value(&config.probe_query)
            .await?
            .unwrap_or(0.0);

        tracing::debug!(
            "History probe for {}: {} samples in the last hour (need {})",
            family,
            count,
            config.min_history_samples
        );
        Ok(count >= config.min_history_samples as f64)
    }
}
