// iOS implementations of the device seams, backed by the shell's ios_* exports.

use std::collections::HashMap;
use std::ffi::{c_void, CString};
use std::sync::{Arc, Mutex, PoisonError};

use super::probe::DeviceSignals;
use super::types::{AppState, ThermalState};
use crate::domains::compression::background::{BackgroundTaskHost, BackgroundTaskId, ExpiryHandler};

extern "C" {
    fn ios_get_battery_level() -> f32;
    fn ios_is_charging() -> bool;
    fn ios_get_thermal_state() -> i32;
    fn ios_get_app_state() -> i32;
    fn ios_physical_memory_bytes() -> u64;
    fn ios_resident_memory_bytes() -> u64;
    fn ios_set_battery_monitoring(enabled: bool);

    fn ios_begin_background_task_safe(
        name: *const std::os::raw::c_char,
        callback: extern "C" fn(*mut c_void),
        context: *mut c_void,
    ) -> i32;
    fn ios_end_background_task_safe(task_id: i32);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IosDeviceSignals;

impl DeviceSignals for IosDeviceSignals {
    fn battery_level(&self) -> f32 {
        unsafe { ios_get_battery_level() }
    }

    fn is_charging(&self) -> bool {
        unsafe { ios_is_charging() }
    }

    fn thermal_state(&self) -> ThermalState {
        ThermalState::from_raw(unsafe { ios_get_thermal_state() })
    }

    fn app_state(&self) -> AppState {
        AppState::from_raw(unsafe { ios_get_app_state() })
    }

    fn physical_memory_bytes(&self) -> u64 {
        unsafe { ios_physical_memory_bytes() }
    }

    fn resident_memory_bytes(&self) -> u64 {
        unsafe { ios_resident_memory_bytes() }
    }

    fn set_battery_monitoring(&self, enabled: bool) {
        unsafe { ios_set_battery_monitoring(enabled) }
    }
}

/// Expiry context handed to the OS; the handler runs at most once.
struct ExpiryContext {
    handler: Mutex<Option<ExpiryHandler>>,
}

extern "C" fn background_expiry_callback(context: *mut c_void) {
    if context.is_null() {
        return;
    }
    // SAFETY: `context` came from `Arc::as_ptr` on a context the host keeps
    // alive until `end_background_task` returns.
    let context = unsafe { &*(context as *const ExpiryContext) };
    let handler = context.handler.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(handler) = handler {
        handler();
    }
}

#[derive(Default)]
pub struct IosBackgroundTaskHost {
    contexts: Mutex<HashMap<i32, Arc<ExpiryContext>>>,
}

impl IosBackgroundTaskHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackgroundTaskHost for IosBackgroundTaskHost {
    fn begin_background_task(&self, name: &str, on_expiry: ExpiryHandler) -> Option<BackgroundTaskId> {
        let name = CString::new(name).ok()?;
        let context = Arc::new(ExpiryContext {
            handler: Mutex::new(Some(on_expiry)),
        });
        let context_ptr = Arc::as_ptr(&context) as *mut c_void;

        let task_id = unsafe {
            ios_begin_background_task_safe(name.as_ptr(), background_expiry_callback, context_ptr)
        };
        if task_id == -1 {
            log::warn!("OS refused background task '{}'", name.to_string_lossy());
            return None;
        }

        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task_id, context);
        Some(BackgroundTaskId(task_id))
    }

    fn end_background_task(&self, id: BackgroundTaskId) {
        unsafe { ios_end_background_task_safe(id.0) };
        // Context is dropped only after the OS stops referencing it
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id.0);
    }
}
