// HTTP request handlers
use crate::domain::error::TelemetryError;
use crate::domain::telemetry::RenderSeries;
use crate::presentation::app_state::AppState;
use crate::presentation::live_socket::run_live_session;
use crate::presentation::protocol::WindowRequest;
use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct MetricSummary {
    pub name: String,
    pub title: String,
    pub unit: String,
}

#[derive(Serialize)]
pub struct FamilySummary {
    pub id: String,
    pub title: String,
    pub metrics: Vec<MetricSummary>,
}

impl IntoResponse for TelemetryError {
    fn into_response(self) -> Response {
        let status = match &self {
            TelemetryError::UnknownFamily(_) => StatusCode::NOT_FOUND,
            TelemetryError::InvalidRange(_) | TelemetryError::MalformedSample { .. } => {
                StatusCode::BAD_REQUEST
            }
            TelemetryError::ProbeFailure { .. } | TelemetryError::Query(_) => {
                tracing::error!("Request failed: {:#}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List configured metric families
pub async fn list_families(State(state): State<Arc<AppState>>) -> Json<Vec<FamilySummary>> {
    let families = state
        .metrics_config
        .families
        .iter()
        .map(|f| FamilySummary {
            id: f.id.clone(),
            title: f.title.clone(),
            metrics: f
                .metrics
                .iter()
                .map(|m| MetricSummary {
                    name: m.name.clone(),
                    title: m.title.clone(),
                    unit: m.unit.clone(),
                })
                .collect(),
        })
        .collect();

    Json(families)
}

/// Aggregated history for one family
pub async fn family_history(
    Path(family): Path<String>,
    Query(request): Query<WindowRequest>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RenderSeries>>, TelemetryError> {
    let window = request.window()?.ok_or_else(|| {
        TelemetryError::InvalidRange("live data is only served over the live socket".to_string())
    })?;

    let series = state.history_service.load(&family, window).await?;
    Ok(Json(series))
}

/// Upgrade to a live dashboard session for one family
pub async fn live_socket(
    Path(family): Path<String>,
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    if state.metrics_config.family(&family).is_none() {
        return TelemetryError::UnknownFamily(family).into_response();
    }

    ws.on_upgrade(move |socket| run_live_session(socket, state, family))
}
