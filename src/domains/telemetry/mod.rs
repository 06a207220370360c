pub mod probe;
pub mod types;
#[cfg(target_os = "ios")]
pub mod ios;

pub use probe::{DeviceSignals, DeviceTelemetryProbe};
pub use types::{
    AppState, DeviceCapabilities, DeviceState, MemoryPressureEvent, MemoryPressureLevel, MemoryTrend,
    ThermalState,
};
#[cfg(target_os = "ios")]
pub use ios::{IosBackgroundTaskHost, IosDeviceSignals};
