// Bridge over the engine's exported C symbols. Linked by build.rs when the
// `native-engine` feature is on.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use super::buffer::{EngineBuffer, ReleaseFn};
use super::error::ErrorCode;
use super::{EngineBridge, EngineCall, RawEngineReply};
use crate::domains::export::ExportDomain;

extern "C" {
    fn compression_queue_document(payload_json: *const c_char) -> i32;
    fn compression_update_priority(payload_json: *const c_char, result: *mut *mut c_char) -> i32;
    fn compression_compress_document(payload_json: *const c_char, result: *mut *mut c_char) -> i32;
    fn compression_cancel(payload_json: *const c_char, result: *mut *mut c_char) -> i32;
    fn compression_get_document_status(payload_json: *const c_char, result: *mut *mut c_char) -> i32;
    fn compression_get_comprehensive_ios_status(result: *mut *mut c_char) -> i32;
    fn compression_get_queue_status(result: *mut *mut c_char) -> i32;
    fn compression_get_stats(result: *mut *mut c_char) -> i32;
    fn compression_update_ios_state(payload_json: *const c_char) -> i32;
    fn compression_handle_background_task_extension(payload_json: *const c_char) -> i32;
    fn compression_handle_enhanced_memory_warning(payload_json: *const c_char) -> i32;
    fn compression_handle_content_visibility(payload_json: *const c_char) -> i32;
    fn compression_handle_app_lifecycle_event(payload_json: *const c_char) -> i32;
    fn compression_detect_ios_capabilities(result: *mut *mut c_char) -> i32;
    fn compression_free(ptr: *mut c_char);

    fn export_strategic_goals_by_ids(options_json: *const c_char, token: *const c_char, result: *mut *mut c_char) -> i32;
    fn export_projects_by_ids(options_json: *const c_char, token: *const c_char, result: *mut *mut c_char) -> i32;
    fn export_participants_by_ids(options_json: *const c_char, token: *const c_char, result: *mut *mut c_char) -> i32;
    fn export_activities_by_ids(options_json: *const c_char, token: *const c_char, result: *mut *mut c_char) -> i32;
    fn export_get_status(job_id: *const c_char, result: *mut *mut c_char) -> i32;
    fn export_free(ptr: *mut c_char);

    fn get_last_error() -> *mut c_char;
    fn free_string(ptr: *mut c_char);
}

/// `EngineBridge` backed by the statically linked engine library
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEngineBridge;

impl NativeEngineBridge {
    pub fn new() -> Self {
        Self
    }

    fn release_for(call: EngineCall) -> ReleaseFn {
        match call {
            EngineCall::ExportByIds(_) | EngineCall::GetExportStatus => export_free,
            _ => compression_free,
        }
    }
}

/// `export_get_status` takes the bare job id rather than a JSON object.
fn export_job_id(payload: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    value.get("job_id")?.as_str().map(str::to_owned)
}

impl EngineBridge for NativeEngineBridge {
    fn invoke(&self, call: EngineCall, payload: &str, auth_token: Option<&str>) -> RawEngineReply {
        let argument = match call {
            EngineCall::GetExportStatus => export_job_id(payload),
            _ => Some(payload.to_owned()),
        };
        let payload = match argument.and_then(|arg| CString::new(arg).ok()) {
            Some(payload) => payload,
            None => return RawEngineReply::status_only(ErrorCode::InvalidArgument as i32),
        };
        let token = match CString::new(auth_token.unwrap_or_default()) {
            Ok(token) => token,
            Err(_) => return RawEngineReply::status_only(ErrorCode::InvalidArgument as i32),
        };

        let p = payload.as_ptr();
        let mut out: *mut c_char = std::ptr::null_mut();
        let result = &mut out as *mut *mut c_char;

        // SAFETY: every pointer handed over is a live NUL-terminated string or
        // a valid out-parameter; the engine does not retain them.
        let status = unsafe {
            match call {
                EngineCall::QueueDocument => compression_queue_document(p),
                EngineCall::UpdatePriority => compression_update_priority(p, result),
                EngineCall::CompressDocument => compression_compress_document(p, result),
                EngineCall::Cancel => compression_cancel(p, result),
                EngineCall::GetDocumentStatus => compression_get_document_status(p, result),
                EngineCall::GetComprehensiveStatus => compression_get_comprehensive_ios_status(result),
                EngineCall::GetQueueStatus => compression_get_queue_status(result),
                EngineCall::GetStats => compression_get_stats(result),
                EngineCall::UpdateDeviceState => compression_update_ios_state(p),
                EngineCall::HandleBackgroundTaskExtension => compression_handle_background_task_extension(p),
                EngineCall::HandleEnhancedMemoryWarning => compression_handle_enhanced_memory_warning(p),
                EngineCall::HandleContentVisibility => compression_handle_content_visibility(p),
                EngineCall::HandleAppLifecycleEvent => compression_handle_app_lifecycle_event(p),
                EngineCall::DetectDeviceCapabilities => compression_detect_ios_capabilities(result),
                EngineCall::ExportByIds(domain) => {
                    let t = token.as_ptr();
                    match domain {
                        ExportDomain::StrategicGoals => export_strategic_goals_by_ids(p, t, result),
                        ExportDomain::Projects => export_projects_by_ids(p, t, result),
                        ExportDomain::Participants => export_participants_by_ids(p, t, result),
                        ExportDomain::Activities => export_activities_by_ids(p, t, result),
                    }
                }
                EngineCall::GetExportStatus => export_get_status(p, result),
            }
        };

        // SAFETY: `out` is null or a string the engine just allocated for us.
        let buffer = unsafe { EngineBuffer::from_raw(out, Self::release_for(call)) };
        RawEngineReply { status, buffer }
    }

    fn last_error(&self) -> Option<String> {
        // SAFETY: the engine returns null or an owned string freed by `free_string`.
        let detail = unsafe { EngineBuffer::from_raw(get_last_error(), free_string) }?;
        detail.to_str().ok().map(str::to_owned)
    }
}
