//! Device resource types pushed to the engine's compression worker.

use serde::{Deserialize, Serialize};

/// Thermal states (matching iOS ProcessInfo.ThermalState)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThermalState {
    Nominal = 0,    // Normal
    Fair = 1,       // Slight throttling
    Serious = 2,    // Moderate throttling
    Critical = 3,   // Heavy throttling
}

impl ThermalState {
    /// Map the raw OS value; anything unrecognised is treated as the worst case.
    pub fn from_raw(value: i32) -> Self {
        match value {
            0 => ThermalState::Nominal,
            1 => ThermalState::Fair,
            2 => ThermalState::Serious,
            _ => ThermalState::Critical,
        }
    }
}

/// App states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppState {
    Active,         // App is active and visible
    Background,     // App is in background
    Inactive,       // App is inactive (transitioning)
}

impl AppState {
    /// Map the raw `UIApplication.State` value
    pub fn from_raw(value: i32) -> Self {
        match value {
            0 => AppState::Active,
            2 => AppState::Background,
            _ => AppState::Inactive,
        }
    }
}

/// Snapshot of device resources, as consumed by `compression_update_ios_state`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub battery_level: f32, // 0.0 to 1.0
    pub is_charging: bool,
    pub thermal_state: ThermalState,
    pub app_state: AppState,
    pub available_memory_mb: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPressureLevel {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryTrend {
    Stable,
    Increasing,
}

/// Payload for `compression_handle_enhanced_memory_warning`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPressureEvent {
    pub level: MemoryPressureLevel,
    pub available_memory_mb: u64,
    pub trend: MemoryTrend,
}

impl MemoryPressureEvent {
    /// Event raised for an OS low-memory notification.
    ///
    /// Severity and trend are fixed rather than derived from past samples.
    pub fn low_memory(available_memory_mb: u64) -> Self {
        Self {
            level: MemoryPressureLevel::Critical,
            available_memory_mb,
            trend: MemoryTrend::Increasing,
        }
    }
}

/// Result of `compression_detect_ios_capabilities`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    #[serde(default, alias = "deviceType")]
    pub device_type: String,
    #[serde(default, alias = "safeConcurrency", alias = "max_concurrent_jobs")]
    pub safe_concurrency: usize,
    #[serde(default, alias = "memoryLimitMB")]
    pub memory_limit_mb: u64,
    #[serde(default)]
    pub recommendations: Vec<String>,
}
