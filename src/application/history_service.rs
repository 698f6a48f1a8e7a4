// History service - Use case for loading aggregated historical charts
use crate::application::clock::{utc_ms_from_local_equivalent, Clock};
use crate::application::telemetry_repository::TelemetryRepository;
use crate::domain::aggregator::Aggregator;
use crate::domain::error::TelemetryError;
use crate::domain::mode::HistoryWindow;
use crate::domain::telemetry::RenderSeries;
use crate::infrastructure::config::{prepare_query, FamilyConfig, MetricsConfig};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct HistoryService {
    repository: Arc<dyn TelemetryRepository>,
    clock: Arc<dyn Clock>,
    metrics_config: Arc<MetricsConfig>,
    aggregator: Aggregator,
}

impl HistoryService {
    pub fn new(
        repository: Arc<dyn TelemetryRepository>,
        clock: Arc<dyn Clock>,
        metrics_config: Arc<MetricsConfig>,
    ) -> Self {
        let aggregator = Aggregator::new(metrics_config.display.aggregation_threshold);
        Self {
            repository,
            clock,
            metrics_config,
            aggregator,
        }
    }

    /// Load one aggregated series per metric of `family_id` for `window`.
    /// Metrics whose query fails or returns nothing are left out.
    pub async fn load(
        &self,
        family_id: &str,
        window: HistoryWindow,
    ) -> Result<Vec<RenderSeries>, TelemetryError> {
        let family = self
            .metrics_config
            .family(family_id)
            .ok_or_else(|| TelemetryError::UnknownFamily(family_id.to_string()))?;

        let (start, end) = window
            .resolve(self.clock.now_ms())
            .ok_or_else(|| TelemetryError::InvalidRange(format!("{:?}", window)))?;
        if start == end {
            return Ok(Vec::new());
        }

        // The store speaks UTC
        let mut vars = HashMap::new();
        vars.insert("start".to_string(), utc_ms_from_local_equivalent(start).to_string());
        vars.insert("end".to_string(), utc_ms_from_local_equivalent(end).to_string());

        Ok(self.fetch_series(family, &vars).await)
    }

    async fn fetch_series(&self, family: &FamilyConfig, vars: &HashMap<String, String>) -> Vec<RenderSeries> {
        let mut series_list = Vec::new();

        for metric in &family.metrics {
            let query = prepare_query(&metric.history_query, vars);
            match self.repository.query_time_series(&query).await {
                Ok(points) => {
                    if points.is_empty() {
                        tracing::debug!("No history for {} in requested window", metric.name);
                        continue;
                    }

                    let raw_len = points.len();
                    let aggregated = self.aggregator.aggregate(&points);
                    tracing::debug!(
                        "Aggregated {} from {} to {} points",
                        metric.name,
                        raw_len,
                        aggregated.len()
                    );
                    series_list.push(RenderSeries::from_samples(metric.name.as_str(), aggregated));
                }
                Err(e) => {
                    tracing::warn!("Error fetching history for {}: {:#}", metric.name, e);
                }
            }
        }

        series_list
    }
}
