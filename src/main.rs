// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use axum::{routing::get, Router};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use ups_telemetry::application::clock::{Clock, SystemClock};
use ups_telemetry::application::dashboard_session::SessionFactory;
use ups_telemetry::application::history_probe::RepositoryHistoryProbe;
use ups_telemetry::application::history_service::HistoryService;
use ups_telemetry::application::telemetry_repository::{HistoryProbe, TelemetryRepository};
use ups_telemetry::infrastructure::config::{load_influx_config, load_metrics_config, load_server_config, ServerConfig};
use ups_telemetry::infrastructure::influx_repository::InfluxRepository;
use ups_telemetry::infrastructure::live_feed::LiveFeed;
use ups_telemetry::presentation::app_state::AppState;
use ups_telemetry::presentation::handlers::{family_history, health_check, list_families, live_socket};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let influx_config = load_influx_config().context("Failed to load config/influx")?;
    let metrics_config = Arc::new(load_metrics_config().context("Failed to load config/metrics")?);
    let server_config = load_server_config().unwrap_or_else(|e| {
        tracing::warn!("Using default server settings: {:#}", e);
        ServerConfig::default()
    });

    // Create repository (infrastructure layer)
    let repository: Arc<dyn TelemetryRepository> = Arc::new(InfluxRepository::new(
        influx_config.influx.host,
        influx_config.influx.token,
        influx_config.influx.database,
        influx_config.influx.retention_policy,
    ));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let probe: Arc<dyn HistoryProbe> = Arc::new(RepositoryHistoryProbe::new(
        repository.clone(),
        metrics_config.clone(),
    ));

    // Create services (application layer)
    let history_service = HistoryService::new(repository.clone(), clock.clone(), metrics_config.clone());
    let sessions = SessionFactory {
        repository: repository.clone(),
        probe,
        clock: clock.clone(),
        history: history_service.clone(),
        metrics_config: metrics_config.clone(),
    };

    let mut live_feed = LiveFeed::new();
    live_feed.spawn_poller(repository.clone(), clock.clone(), metrics_config.clone());

    // Create application state
    let state = Arc::new(AppState {
        sessions,
        history_service,
        live_feed,
        metrics_config,
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/families", get(list_families))
        .route(
            "/families/:family/history",
            get(family_history).layer(CompressionLayer::new()),
        )
        .route("/families/:family/live", get(live_socket))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = server_config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", server_config.server.bind))?;
    tracing::info!("Starting ups-telemetry service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
