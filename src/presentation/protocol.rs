// Wire protocol shared by the history endpoint and the live socket
use crate::domain::error::TelemetryError;
use crate::domain::mode::{HistoryWindow, Mode, ModeChange};
use crate::domain::telemetry::RenderSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Requested mode plus whatever parameters it needs.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowRequest {
    pub mode: Mode,
    /// `YYYY-MM-DD`, required for `selectedDay`.
    pub date: Option<String>,
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl WindowRequest {
    /// `None` means Live.
    pub fn window(&self) -> Result<Option<HistoryWindow>, TelemetryError> {
        match self.mode {
            Mode::Live => Ok(None),
            Mode::Today => Ok(Some(HistoryWindow::Today)),
            Mode::SelectedDay => {
                let date = self
                    .date
                    .as_deref()
                    .ok_or_else(|| TelemetryError::InvalidRange("selectedDay requires a date".to_string()))?;
                let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map_err(|e| TelemetryError::InvalidRange(format!("bad date {}: {}", date, e)))?;
                Ok(Some(HistoryWindow::Day(day)))
            }
            Mode::Range => match (self.start, self.end) {
                (Some(start), Some(end)) => Ok(Some(HistoryWindow::Range { start, end })),
                _ => Err(TelemetryError::InvalidRange(
                    "range requires start and end".to_string(),
                )),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientCommand {
    Switch(WindowRequest),
    Override,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Mode(ModeChange),
    Series(RenderSeries),
    History {
        series: Vec<RenderSeries>,
    },
    SwitchResult {
        accepted: bool,
    },
    OverrideResult {
        #[serde(rename = "wasEnforced")]
        was_enforced: bool,
    },
    Error {
        message: String,
    },
}
