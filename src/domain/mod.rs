// Domain layer - Pure data types and display algorithms
pub mod aggregator;
pub mod error;
pub mod mode;
pub mod sample_buffer;
pub mod smoother;
pub mod telemetry;
pub mod warmup;
