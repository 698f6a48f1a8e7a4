// InfluxDB repository implementation
use crate::application::clock::local_equivalent_ms;
use crate::application::telemetry_repository::TelemetryRepository;
use crate::domain::telemetry::Sample;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct InfluxRepository {
    client: reqwest::Client,
    host: String,
    token: String,
    database: String,
    retention_policy: String,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResponse {
    results: Vec<InfluxQLResult>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResult {
    #[serde(default)]
    series: Option<Vec<InfluxQLSeries>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLSeries {
    #[allow(dead_code)]
    name: String,
    columns: Vec<String>,
    values: Vec<Vec<serde_json::Value>>,
}

impl InfluxRepository {
    pub fn new(host: String, token: String, database: String, retention_policy: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: host.trim_end_matches('/').to_string(),
            token,
            database,
            retention_policy,
        }
    }

    fn build_query_url(&self, query: &str) -> String {
        let encoded_query = urlencoding::encode(query);
        format!(
            "{}/query?db={}&rp={}&q={}",
            self.host, self.database, self.retention_policy, encoded_query
        )
    }

    async fn execute_query(&self, query: &str) -> Result<InfluxQLResponse> {
        let url = self.build_query_url(query);

        tracing::debug!("Executing InfluxQL query: {}", query);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to InfluxDB")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("InfluxDB query failed with status {}: {}", status, body);
        }

        let data = response
            .json::<InfluxQLResponse>()
            .await
            .context("Failed to parse InfluxDB response")?;

        check_result_error(&data)?;
        Ok(data)
    }
}

fn check_result_error(data: &InfluxQLResponse) -> Result<()> {
    if let Some(result) = data.results.first() {
        if let Some(error) = &result.error {
            anyhow::bail!("InfluxDB query error: {}", error);
        }
    }
    Ok(())
}

/// First numeric value of the first row, preferring aggregate column names.
fn parse_single_value(response: &InfluxQLResponse) -> Option<f64> {
    let series = response.results.first()?.series.as_ref()?.first()?;
    let value_row = series.values.first()?;
    let value_idx = series
        .columns
        .iter()
        .position(|c| c == "mean" || c == "last" || c == "count" || c == "value")
        .unwrap_or(1);

    value_row.get(value_idx)?.as_f64()
}

/// Rows with an RFC3339 `time` and a numeric `value`, converted to
/// local-time-equivalent timestamps. Rows with null values are skipped.
fn parse_time_series(response: &InfluxQLResponse) -> Vec<Sample> {
    let mut points = Vec::new();
    let Some(series_list) = response.results.first().and_then(|r| r.series.as_ref()) else {
        return points;
    };

    for s in series_list {
        let time_idx = s.columns.iter().position(|c| c == "time").unwrap_or(0);
        let value_idx = s
            .columns
            .iter()
            .position(|c| c == "value" || c == "mean")
            .unwrap_or(1);

        for value_row in &s.values {
            let (Some(time_str), Some(value)) = (
                value_row.get(time_idx).and_then(|v| v.as_str()),
                value_row.get(value_idx).and_then(|v| v.as_f64()),
            ) else {
                continue;
            };

            if let Ok(time) = chrono::DateTime::parse_from_rfc3339(time_str) {
                points.push(Sample::new(local_equivalent_ms(time.timestamp_millis()), value));
            }
        }
    }

    points
}

#[async_trait]
impl TelemetryRepository for InfluxRepository {
    async fn query_single_value(&self, query: &str) -> Result<Option<f64>> {
        let response = self.execute_query(query).await?;
        Ok(parse_single_value(&response))
    }

    async fn query_time_series(&self, query: &str) -> Result<Vec<Sample>> {
        let response = self.execute_query(query).await?;
        let points = parse_time_series(&response);
        tracing::debug!("Fetched {} points from InfluxDB", points.len());
        Ok(points)
    }
}
