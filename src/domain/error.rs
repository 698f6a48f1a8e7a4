// Error taxonomy for the display core and its adapters
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The history-sufficiency probe could not be answered.
    #[error("history probe failed for {family}: {reason}")]
    ProbeFailure { family: String, reason: String },

    #[error("malformed sample for {metric}: value {value} is not finite")]
    MalformedSample { metric: String, value: f64 },

    #[error("unknown metric family: {0}")]
    UnknownFamily(String),

    #[error("invalid time range: {0}")]
    InvalidRange(String),

    #[error("query failed: {0}")]
    Query(#[from] anyhow::Error),
}
