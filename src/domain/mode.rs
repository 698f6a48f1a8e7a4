// Data-acquisition modes and the historical windows they select
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    Live,
    Today,
    SelectedDay,
    Range,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Live => "live",
            Mode::Today => "today",
            Mode::SelectedDay => "selectedDay",
            Mode::Range => "range",
        };
        f.write_str(name)
    }
}

/// `enforced_until` is only ever set while `mode` is Live and nobody has
/// overridden the enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeState {
    pub mode: Mode,
    pub enforced_until: Option<i64>,
    pub enforcement_started_at: Option<i64>,
}

impl ModeState {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            enforced_until: None,
            enforcement_started_at: None,
        }
    }

    pub fn is_enforced(&self, now_ms: i64) -> bool {
        self.mode == Mode::Live && self.enforced_until.is_some_and(|until| now_ms < until)
    }

    pub fn clear_enforcement(&mut self) {
        self.enforced_until = None;
        self.enforcement_started_at = None;
    }
}

/// Notification emitted whenever the mode or its enforcement changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeChange {
    pub mode: Mode,
    pub enforced: bool,
}

/// The historical slice a non-live mode displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryWindow {
    Today,
    Day(NaiveDate),
    Range { start: i64, end: i64 },
}

impl HistoryWindow {
    pub fn mode(&self) -> Mode {
        match self {
            HistoryWindow::Today => Mode::Today,
            HistoryWindow::Day(_) => Mode::SelectedDay,
            HistoryWindow::Range { .. } => Mode::Range,
        }
    }

    /// Half-open `[start, end)` interval in local-time-equivalent epoch ms.
    /// Returns `None` for an empty or inverted range. Today is empty, not
    /// invalid, at exactly midnight.
    pub fn resolve(&self, now_ms: i64) -> Option<(i64, i64)> {
        match *self {
            HistoryWindow::Today => {
                let today = chrono::DateTime::from_timestamp_millis(now_ms)?.date_naive();
                let start = local_midnight_ms(today)?;
                (start <= now_ms).then_some((start, now_ms))
            }
            HistoryWindow::Day(day) => {
                let next = day.checked_add_signed(Duration::days(1))?;
                Some((local_midnight_ms(day)?, local_midnight_ms(next)?))
            }
            HistoryWindow::Range { start, end } => (start < end).then_some((start, end)),
        }
    }
}

/// Midnight of `day` expressed the same way the system clock reports time:
/// local wall-clock read as if it were UTC.
fn local_midnight_ms(day: NaiveDate) -> Option<i64> {
    Some(day.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}
