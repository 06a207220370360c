pub mod compression;
pub mod export;
pub mod telemetry;
