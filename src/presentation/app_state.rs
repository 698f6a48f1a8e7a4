// Application state for HTTP handlers
use crate::application::dashboard_session::SessionFactory;
use crate::application::history_service::HistoryService;
use crate::infrastructure::config::MetricsConfig;
use crate::infrastructure::live_feed::LiveFeed;
use std::sync::Arc;

pub struct AppState {
    pub sessions: SessionFactory,
    pub history_service: HistoryService,
    pub live_feed: LiveFeed,
    pub metrics_config: Arc<MetricsConfig>,
}
