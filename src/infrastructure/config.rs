use crate::domain::warmup::WarmupGenerator;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxConfig {
    pub influx: InfluxSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxSettings {
    pub host: String,
    pub token: String,
    pub database: String,
    pub retention_policy: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MetricsConfig {
    #[serde(default)]
    pub display: DisplaySettings,
    #[serde(default)]
    pub families: Vec<FamilyConfig>,
}

impl MetricsConfig {
    pub fn family(&self, id: &str) -> Option<&FamilyConfig> {
        self.families.iter().find(|f| f.id == id)
    }
}

/// Tuning shared by every metric family.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DisplaySettings {
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    #[serde(default = "default_smoothing_base")]
    pub smoothing_base: f64,
    #[serde(default = "default_aggregation_threshold")]
    pub aggregation_threshold: usize,
    /// Length of the live chart trace, also the number of warm-up points.
    #[serde(default = "default_live_window")]
    pub live_window: usize,
    #[serde(default = "default_warmup_spacing_ms")]
    pub warmup_spacing_ms: i64,
    #[serde(default = "default_min_live_minutes")]
    pub min_live_minutes: i64,
    #[serde(default = "default_recheck_interval_secs")]
    pub recheck_interval_secs: u64,
    #[serde(default = "default_live_poll_interval_ms")]
    pub live_poll_interval_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            smoothing_base: default_smoothing_base(),
            aggregation_threshold: default_aggregation_threshold(),
            live_window: default_live_window(),
            warmup_spacing_ms: default_warmup_spacing_ms(),
            min_live_minutes: default_min_live_minutes(),
            recheck_interval_secs: default_recheck_interval_secs(),
            live_poll_interval_ms: default_live_poll_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl DisplaySettings {
    pub fn min_live_ms(&self) -> i64 {
        self.min_live_minutes.max(0) * 60_000
    }

    pub fn recheck_interval(&self) -> Duration {
        Duration::from_secs(self.recheck_interval_secs.max(1))
    }

    pub fn live_poll_interval(&self) -> Duration {
        Duration::from_millis(self.live_poll_interval_ms.max(100))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FamilyConfig {
    pub id: String,
    pub title: String,
    /// Query returning the number of samples stored over the last hour.
    pub probe_query: String,
    #[serde(default = "default_min_history_samples")]
    pub min_history_samples: u64,
    #[serde(default)]
    pub metrics: Vec<MetricConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricConfig {
    pub name: String,
    pub title: String,
    pub unit: String,
    #[serde(default)]
    pub floor: f64,
    pub ceiling: Option<f64>,
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
    pub live_query: String,
    /// Template with `${start}` and `${end}` placeholders (epoch ms).
    pub history_query: String,
}

impl MetricConfig {
    pub fn warmup(&self, display: &DisplaySettings) -> WarmupGenerator {
        WarmupGenerator {
            count: display.live_window,
            spacing_ms: display.warmup_spacing_ms,
            jitter_fraction: self.jitter_fraction,
            floor: self.floor,
            ceiling: self.ceiling,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_buffer_capacity() -> usize {
    15
}

fn default_smoothing_base() -> f64 {
    1.2
}

fn default_aggregation_threshold() -> usize {
    250
}

fn default_live_window() -> usize {
    30
}

fn default_warmup_spacing_ms() -> i64 {
    2_000
}

fn default_min_live_minutes() -> i64 {
    60
}

fn default_recheck_interval_secs() -> u64 {
    300
}

fn default_live_poll_interval_ms() -> u64 {
    1_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_min_history_samples() -> u64 {
    3_000
}

fn default_jitter_fraction() -> f64 {
    0.02
}

/// Load `config/<name>` with `UPS__SECTION__KEY` environment overrides.
fn load<T: DeserializeOwned>(name: &str) -> anyhow::Result<T> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(&format!("config/{}", name)))
        .add_source(config::Environment::with_prefix("UPS").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

pub fn load_influx_config() -> anyhow::Result<InfluxConfig> {
    load("influx")
}

pub fn load_metrics_config() -> anyhow::Result<MetricsConfig> {
    load("metrics")
}

pub fn load_server_config() -> anyhow::Result<ServerConfig> {
    load("server")
}

/// Replace template variables in a query string
pub fn prepare_query(query: &str, vars: &HashMap<String, String>) -> String {
    let mut result = query.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_query() {
        let mut vars = HashMap::new();
        vars.insert("start".to_string(), "1000".to_string());
        vars.insert("end".to_string(), "2000".to_string());

        let query = "SELECT value FROM ups WHERE time >= ${start}ms AND time < ${end}ms";
        let result = prepare_query(query, &vars);

        assert_eq!(result, "SELECT value FROM ups WHERE time >= 1000ms AND time < 2000ms");
    }

    #[test]
    fn test_metrics_config_defaults() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [[families]]
                id = "battery"
                title = "Battery"
                probe_query = "SELECT count(value) FROM battery"

                [[families.metrics]]
                name = "battery_charge"
                title = "Charge"
                unit = "%"
                ceiling = 100.0
                live_query = "SELECT last(value) FROM battery"
                history_query = "SELECT value FROM battery WHERE time >= ${start}ms"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let metrics: MetricsConfig = settings.try_deserialize().unwrap();

        assert_eq!(metrics.display, DisplaySettings::default());
        assert_eq!(metrics.display.min_live_ms(), 3_600_000);
        assert_eq!(metrics.display.recheck_interval(), Duration::from_secs(300));
        assert_eq!(metrics.display.probe_timeout(), Duration::from_secs(5));

        let family = metrics.family("battery").unwrap();
        assert_eq!(family.min_history_samples, 3_000);

        let warmup = family.metrics[0].warmup(&metrics.display);
        assert_eq!(warmup.count, 30);
        assert_eq!(warmup.ceiling, Some(100.0));
        assert_eq!(warmup.jitter_fraction, 0.02);
        assert!(metrics.family("power").is_none());
    }
}
