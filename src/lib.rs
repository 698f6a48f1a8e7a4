// Time-series display core for the UPS telemetry dashboard
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
