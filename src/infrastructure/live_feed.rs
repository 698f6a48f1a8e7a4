// Live feed - Polls latest readings and fans them out to every open view
use crate::application::clock::Clock;
use crate::application::telemetry_repository::TelemetryRepository;
use crate::domain::telemetry::LiveSampleEvent;
use crate::infrastructure::config::MetricsConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const FEED_CHANNEL_CAPACITY: usize = 256;

pub struct LiveFeed {
    tx: broadcast::Sender<LiveSampleEvent>,
    poller: Option<JoinHandle<()>>,
}

impl LiveFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CHANNEL_CAPACITY);
        Self { tx, poller: None }
    }

    /// Start polling every metric's `live_query` at the configured interval.
    pub fn spawn_poller(
        &mut self,
        repository: Arc<dyn TelemetryRepository>,
        clock: Arc<dyn Clock>,
        metrics_config: Arc<MetricsConfig>,
    ) {
        self.stop();

        let tx = self.tx.clone();
        let period = metrics_config.display.live_poll_interval();
        self.poller = Some(tokio::spawn(async move {
            poll_loop(tx, repository, clock, metrics_config, period).await;
        }));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveSampleEvent> {
        self.tx.subscribe()
    }

    pub fn stop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    tx: broadcast::Sender<LiveSampleEvent>,
    repository: Arc<dyn TelemetryRepository>,
    clock: Arc<dyn Clock>,
    metrics_config: Arc<MetricsConfig>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        // Nobody is watching; skip the round trip
        if tx.receiver_count() == 0 {
            continue;
        }

        let timestamp = clock.now_ms();
        for family in &metrics_config.families {
            for metric in &family.metrics {
                match repository.query_single_value(&metric.live_query).await {
                    Ok(Some(value)) => {
                        let event = LiveSampleEvent::new(family.id.as_str(), metric.name.as_str(), value, timestamp);
                        let _ = tx.send(event);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!("Live poll failed for {}: {:#}", metric.name, e);
                    }
                }
            }
        }
    }
}
