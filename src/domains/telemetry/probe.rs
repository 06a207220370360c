use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::types::{AppState, DeviceState, ThermalState};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// OS-exposed device signals.
///
/// Reads must be cheap and side-effect free; the only mutation is toggling
/// battery monitoring.
pub trait DeviceSignals: Send + Sync {
    /// Battery fraction; negative when unknown (monitoring off, simulator)
    fn battery_level(&self) -> f32;
    fn is_charging(&self) -> bool;
    fn thermal_state(&self) -> ThermalState;
    fn app_state(&self) -> AppState;
    fn physical_memory_bytes(&self) -> u64;
    fn resident_memory_bytes(&self) -> u64;
    fn set_battery_monitoring(&self, enabled: bool);
}

/// Reads battery, thermal, app-state and memory signals into a `DeviceState`.
pub struct DeviceTelemetryProbe {
    signals: Arc<dyn DeviceSignals>,
    monitoring: AtomicBool,
}

impl DeviceTelemetryProbe {
    pub fn new(signals: Arc<dyn DeviceSignals>) -> Self {
        Self {
            signals,
            monitoring: AtomicBool::new(false),
        }
    }

    pub fn enable_monitoring(&self) {
        if !self.monitoring.swap(true, Ordering::SeqCst) {
            self.signals.set_battery_monitoring(true);
            log::debug!("Battery monitoring enabled");
        }
    }

    pub fn disable_monitoring(&self) {
        if self.monitoring.swap(false, Ordering::SeqCst) {
            self.signals.set_battery_monitoring(false);
            log::debug!("Battery monitoring disabled");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    /// `physical - resident`, in MB, never below zero
    pub fn available_memory_mb(&self) -> u64 {
        let physical = self.signals.physical_memory_bytes();
        let resident = self.signals.resident_memory_bytes();
        physical.saturating_sub(resident) / BYTES_PER_MB
    }

    pub fn snapshot(&self) -> DeviceState {
        DeviceState {
            battery_level: normalize_battery(self.signals.battery_level()),
            is_charging: self.signals.is_charging(),
            thermal_state: self.signals.thermal_state(),
            app_state: self.signals.app_state(),
            available_memory_mb: self.available_memory_mb(),
        }
    }
}

// Unknown battery reads as full so the engine does not throttle on missing data
fn normalize_battery(level: f32) -> f32 {
    if level.is_nan() || level < 0.0 {
        return 1.0;
    }
    level.min(1.0)
}
