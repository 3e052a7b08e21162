pub mod responses;
pub mod telemetry;
pub mod types;
