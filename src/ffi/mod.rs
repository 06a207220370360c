// In src/ffi/mod.rs
//! Engine boundary.
//!
//! The engine is reachable only through C entry points that take UTF-8 JSON
//! and return an integer status plus, for some calls, a JSON buffer the caller
//! must release. `EngineBridge` is the raw seam over those entry points;
//! `EngineClient` layers encoding, classification, decoding and off-thread
//! dispatch on top.

use crate::domains::export::ExportDomain;

pub mod buffer;
pub mod client;
pub mod error;
#[cfg(feature = "native-engine")]
pub mod native;

pub use buffer::{EngineBuffer, ReleaseFn};
pub use client::{EngineClient, EngineReply};
pub use error::{EngineErrorPayload, ErrorCode, QueueStatusCode};

/// Every engine entry point the orchestration layer consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineCall {
    QueueDocument,
    UpdatePriority,
    CompressDocument,
    Cancel,
    GetDocumentStatus,
    GetComprehensiveStatus,
    GetQueueStatus,
    GetStats,
    UpdateDeviceState,
    HandleBackgroundTaskExtension,
    HandleEnhancedMemoryWarning,
    HandleContentVisibility,
    HandleAppLifecycleEvent,
    DetectDeviceCapabilities,
    ExportByIds(ExportDomain),
    GetExportStatus,
}

impl EngineCall {
    /// C symbol exported by the engine
    pub fn symbol(&self) -> &'static str {
        match self {
            EngineCall::QueueDocument => "compression_queue_document",
            EngineCall::UpdatePriority => "compression_update_priority",
            EngineCall::CompressDocument => "compression_compress_document",
            EngineCall::Cancel => "compression_cancel",
            EngineCall::GetDocumentStatus => "compression_get_document_status",
            EngineCall::GetComprehensiveStatus => "compression_get_comprehensive_ios_status",
            EngineCall::GetQueueStatus => "compression_get_queue_status",
            EngineCall::GetStats => "compression_get_stats",
            EngineCall::UpdateDeviceState => "compression_update_ios_state",
            EngineCall::HandleBackgroundTaskExtension => "compression_handle_background_task_extension",
            EngineCall::HandleEnhancedMemoryWarning => "compression_handle_enhanced_memory_warning",
            EngineCall::HandleContentVisibility => "compression_handle_content_visibility",
            EngineCall::HandleAppLifecycleEvent => "compression_handle_app_lifecycle_event",
            EngineCall::DetectDeviceCapabilities => "compression_detect_ios_capabilities",
            EngineCall::ExportByIds(domain) => domain.engine_symbol(),
            EngineCall::GetExportStatus => "export_get_status",
        }
    }

    /// Whether the entry point writes a response buffer
    pub fn returns_payload(&self) -> bool {
        !matches!(
            self,
            EngineCall::QueueDocument
                | EngineCall::UpdateDeviceState
                | EngineCall::HandleBackgroundTaskExtension
                | EngineCall::HandleEnhancedMemoryWarning
                | EngineCall::HandleContentVisibility
                | EngineCall::HandleAppLifecycleEvent
        )
    }

    /// Whether the entry point takes a JSON request at all
    pub fn takes_payload(&self) -> bool {
        !matches!(
            self,
            EngineCall::GetComprehensiveStatus
                | EngineCall::GetQueueStatus
                | EngineCall::GetStats
                | EngineCall::DetectDeviceCapabilities
        )
    }
}

impl std::fmt::Display for EngineCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Raw result of one engine invocation
#[derive(Debug)]
pub struct RawEngineReply {
    pub status: i32,
    pub buffer: Option<EngineBuffer>,
}

impl RawEngineReply {
    pub fn status_only(status: i32) -> Self {
        Self { status, buffer: None }
    }
}

/// Synchronous seam over the engine's C entry points.
///
/// Implementations may block; callers must not invoke them on the
/// coordinator's execution context (see `EngineClient`).
pub trait EngineBridge: Send + Sync {
    /// Invoke one entry point with a UTF-8 JSON payload ("" for calls that
    /// take none) and an optional auth token.
    fn invoke(&self, call: EngineCall, payload: &str, auth_token: Option<&str>) -> RawEngineReply;

    /// The engine's detail for the most recent failure on this thread
    fn last_error(&self) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_only_calls_have_no_buffer() {
        assert!(!EngineCall::QueueDocument.returns_payload());
        assert!(!EngineCall::UpdateDeviceState.returns_payload());
        assert!(EngineCall::UpdatePriority.returns_payload());
        assert!(EngineCall::ExportByIds(ExportDomain::Projects).returns_payload());
    }

    #[test]
    fn test_symbols_match_engine_exports() {
        assert_eq!(EngineCall::Cancel.symbol(), "compression_cancel");
        assert_eq!(
            EngineCall::ExportByIds(ExportDomain::StrategicGoals).to_string(),
            "export_strategic_goals_by_ids"
        );
        assert!(!EngineCall::GetComprehensiveStatus.takes_payload());
    }
}
