// Application layer - Use cases and the traits they depend on
pub mod clock;
pub mod dashboard_session;
pub mod history_probe;
pub mod history_service;
pub mod live_view;
pub mod mode_controller;
pub mod telemetry_repository;
