pub mod env;
pub mod telemetry;
pub mod tracing;
