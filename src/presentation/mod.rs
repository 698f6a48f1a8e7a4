// Presentation layer - HTTP and WebSocket surface
pub mod app_state;
pub mod handlers;
pub mod live_socket;
pub mod protocol;
