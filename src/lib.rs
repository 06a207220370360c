//! Client-side orchestration for the iPad engine's background work: selected-item
//! exports, the compression worker's resource budget, and device telemetry.

// Public modules
pub mod config;
pub mod domains;
pub mod errors;
pub mod ffi;
pub mod services;
pub mod validation;

#[cfg(test)]
mod testing;

pub use config::{CompressionCoordinatorConfig, ExportPollConfig, OrchestratorConfig};
pub use domains::compression::{
    BackgroundTaskHost, BudgetPhase, CompressionPriority, CompressionResourceCoordinator, LifecycleEvent,
};
pub use domains::export::{ExportDomain, ExportFormat, ExportJobCoordinator, ExportNavigator, ExportOutcome};
pub use domains::telemetry::{DeviceSignals, DeviceState, DeviceTelemetryProbe};
pub use errors::{ServiceError, ServiceResult, ValidationError};
pub use ffi::{EngineBridge, EngineCall, EngineClient};
pub use services::ClientServices;

/// Install the `env_logger` backend.
///
/// Defaults `RUST_LOG` to `debug` in debug builds and `info` in release builds.
/// Safe to call more than once.
pub fn init_logging() {
    if std::env::var_os("RUST_LOG").is_none() {
        let level = if cfg!(debug_assertions) { "debug" } else { "info" };
        std::env::set_var("RUST_LOG", level);
    }
    // Another logger may already be installed by the host app
    let _ = env_logger::try_init();
}
