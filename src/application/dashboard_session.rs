// Dashboard session - Per-view context owning mode and live state
use crate::application::clock::Clock;
use crate::application::history_service::HistoryService;
use crate::application::live_view::LiveView;
use crate::application::mode_controller::{ModeController, ModePolicy};
use crate::application::telemetry_repository::{HistoryProbe, TelemetryRepository};
use crate::domain::error::TelemetryError;
use crate::domain::mode::{HistoryWindow, Mode, ModeChange};
use crate::domain::telemetry::{LiveSampleEvent, RenderSeries};
use crate::infrastructure::config::{FamilyConfig, MetricsConfig};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared, stateless dependencies every session is built from.
#[derive(Clone)]
pub struct SessionFactory {
    pub repository: Arc<dyn TelemetryRepository>,
    pub probe: Arc<dyn HistoryProbe>,
    pub clock: Arc<dyn Clock>,
    pub history: HistoryService,
    pub metrics_config: Arc<MetricsConfig>,
}

impl SessionFactory {
    pub async fn open(&self, family_id: &str) -> Result<DashboardSession, TelemetryError> {
        let family = self
            .metrics_config
            .family(family_id)
            .ok_or_else(|| TelemetryError::UnknownFamily(family_id.to_string()))?
            .clone();
        let display = &self.metrics_config.display;

        let controller = ModeController::start(
            family.id.clone(),
            self.probe.clone(),
            self.clock.clone(),
            ModePolicy::from(display),
        )
        .await;
        let live = LiveView::new(&family, display);

        Ok(DashboardSession {
            family,
            controller,
            live,
            repository: self.repository.clone(),
            clock: self.clock.clone(),
            history: self.history.clone(),
        })
    }
}

/// Everything one open dashboard view owns. Dropping the session cancels
/// its background enforcement check.
pub struct DashboardSession {
    family: FamilyConfig,
    controller: ModeController,
    live: LiveView,
    repository: Arc<dyn TelemetryRepository>,
    clock: Arc<dyn Clock>,
    history: HistoryService,
}

impl DashboardSession {
    pub fn family_id(&self) -> &str {
        &self.family.id
    }

    pub fn mode(&self) -> ModeChange {
        self.controller.current()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModeChange> {
        self.controller.subscribe()
    }

    /// Seed every live trace from the latest stored value so the chart has
    /// something to draw before the first push arrives.
    pub async fn warm_up(&mut self) -> Vec<RenderSeries> {
        let now = self.clock.now_ms();
        let mut seeded = Vec::new();

        for metric in &self.family.metrics {
            match self.repository.query_single_value(&metric.live_query).await {
                Ok(Some(value)) => {
                    if let Some(series) = self.live.seed(&metric.name, value, now) {
                        seeded.push(series);
                    }
                }
                Ok(None) => {
                    tracing::debug!("No latest value for {}, waiting for live data", metric.name);
                }
                Err(e) => {
                    tracing::warn!("Error fetching latest value for {}: {:#}", metric.name, e);
                }
            }
        }

        seeded
    }

    /// Feed a live event. Returns the updated series while in Live mode.
    /// Events for other families are ignored.
    pub fn handle_live(&mut self, event: &LiveSampleEvent) -> Option<RenderSeries> {
        if event.family != self.family.id || self.controller.mode() != Mode::Live {
            return None;
        }

        match self.live.ingest(event) {
            Ok(series) => series,
            Err(e) => {
                tracing::warn!("Dropping live sample: {}", e);
                None
            }
        }
    }

    pub fn enter_live(&mut self) {
        self.controller.enter_live();
    }

    /// Ask to leave for `target`. Leaving Live discards its buffers.
    pub fn request_switch(&mut self, target: Mode) -> bool {
        let leaving_live = self.controller.mode() == Mode::Live && target != Mode::Live;
        let accepted = self.controller.request_switch(target);
        if accepted && leaving_live {
            self.live.reset();
        }
        accepted
    }

    pub fn override_enforcement(&mut self) -> bool {
        self.controller.override_enforcement()
    }

    /// Switch to the window's mode and load its series. A rejected switch
    /// yields `Ok(None)` and leaves the session untouched.
    pub async fn show_history(
        &mut self,
        window: HistoryWindow,
    ) -> Result<Option<Vec<RenderSeries>>, TelemetryError> {
        window
            .resolve(self.clock.now_ms())
            .ok_or_else(|| TelemetryError::InvalidRange(format!("{:?}", window)))?;

        if !self.request_switch(window.mode()) {
            return Ok(None);
        }

        self.history.load(&self.family.id, window).await.map(Some)
    }

    pub fn shutdown(&mut self) {
        self.controller.shutdown();
        self.live.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::clock::ManualClock;
    use crate::application::history_service::tests::FakeRepository;
    use crate::application::live_view::tests::family;
    use crate::application::mode_controller::tests::FakeProbe;

    const T0: i64 = 1_767_225_600_000;

    fn factory(sufficient: bool, latest: Option<f64>) -> SessionFactory {
        let repository = Arc::new(FakeRepository {
            latest,
            ..FakeRepository::default()
        });
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(T0 + 3_600_000));
        let metrics_config = Arc::new(MetricsConfig {
            families: vec![family()],
            ..MetricsConfig::default()
        });
        SessionFactory {
            repository: repository.clone(),
            probe: FakeProbe::new(sufficient),
            clock: clock.clone(),
            history: HistoryService::new(repository, clock, metrics_config.clone()),
            metrics_config,
        }
    }

    #[tokio::test]
    async fn test_enforced_session_rejects_history_until_override() {
        let mut session = factory(false, Some(120.0)).open("power").await.unwrap();
        assert_eq!(session.mode(), ModeChange { mode: Mode::Live, enforced: true });

        let seeded = session.warm_up().await;
        assert_eq!(seeded.len(), 2);

        let series = session
            .handle_live(&LiveSampleEvent::new("power", "load_watts", 121.0, T0 + 3_600_000))
            .unwrap();
        assert_eq!(series.points.len(), 30);

        assert_eq!(session.show_history(HistoryWindow::Today).await.unwrap(), None);
        assert_eq!(session.mode().mode, Mode::Live);

        assert!(session.override_enforcement());
        let history = session.show_history(HistoryWindow::Today).await.unwrap().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(session.mode().mode, Mode::Today);

        // live buffers were discarded and live events are ignored outside Live
        assert!(session
            .handle_live(&LiveSampleEvent::new("power", "load_watts", 1.0, T0))
            .is_none());
    }

    #[tokio::test]
    async fn test_sufficient_session_starts_in_today() {
        let mut session = factory(true, None).open("power").await.unwrap();
        assert_eq!(session.family_id(), "power");
        assert_eq!(session.mode(), ModeChange { mode: Mode::Today, enforced: false });
        assert!(session.warm_up().await.is_empty());
        assert!(session
            .handle_live(&LiveSampleEvent::new("power", "load_watts", 1.0, T0))
            .is_none());

        session.enter_live();
        let series = session
            .handle_live(&LiveSampleEvent::new("power", "load_watts", 1.0, T0))
            .unwrap();
        assert_eq!(series.series_name, "load_watts");
        assert!(session.request_switch(Mode::Range));
    }

    #[tokio::test]
    async fn test_other_family_events_are_ignored() {
        let mut session = factory(false, None).open("power").await.unwrap();
        assert!(session
            .handle_live(&LiveSampleEvent::new("voltage", "load_watts", 230.0, T0))
            .is_none());

        let series = session
            .handle_live(&LiveSampleEvent::new("power", "load_watts", 120.0, T0))
            .unwrap();
        assert!(series.points.iter().all(|p| p.y != 230.0));
    }

    #[tokio::test]
    async fn test_malformed_live_sample_is_dropped() {
        let mut session = factory(false, None).open("power").await.unwrap();
        assert!(session
            .handle_live(&LiveSampleEvent::new("power", "load_watts", f64::INFINITY, T0))
            .is_none());
    }

    #[tokio::test]
    async fn test_invalid_window_leaves_mode_alone() {
        let mut session = factory(true, None).open("power").await.unwrap();
        let err = session
            .show_history(HistoryWindow::Range { start: 10, end: 0 })
            .await
            .unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidRange(_)));
        assert_eq!(session.mode().mode, Mode::Today);
    }

    #[tokio::test]
    async fn test_unknown_family() {
        let err = factory(true, None).open("cooling").await.err().unwrap();
        assert!(matches!(err, TelemetryError::UnknownFamily(_)));
    }
}
