//! Type definitions for the compression domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domains::telemetry::DeviceCapabilities;
use crate::errors::ValidationError;
use crate::validation::DocumentId;

/// Compression methods the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionMethod {
    /// General-purpose lossless compression (deflate, zlib)
    Lossless,

    /// Lossy compression for images and media
    Lossy,

    /// Optimized PDF compression
    PdfOptimize,

    /// Office document optimization
    OfficeOptimize,

    /// Video container optimization and metadata removal
    VideoOptimize,

    /// No compression
    None,
}

/// Priority for compression operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompressionPriority {
    High,
    Normal,
    Low,
    Background,
}

impl CompressionPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionPriority::High => "HIGH",
            CompressionPriority::Normal => "NORMAL",
            CompressionPriority::Low => "LOW",
            CompressionPriority::Background => "BACKGROUND",
        }
    }
}

impl FromStr for CompressionPriority {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "HIGH" => Ok(CompressionPriority::High),
            "NORMAL" => Ok(CompressionPriority::Normal),
            "LOW" => Ok(CompressionPriority::Low),
            "BACKGROUND" | "BG" => Ok(CompressionPriority::Background),
            _ => Err(ValidationError::invalid_value(
                "priority",
                "must be HIGH, NORMAL, LOW or BACKGROUND",
            )),
        }
    }
}

/// Configuration for compression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub method: CompressionMethod,
    pub quality_level: i32, // 0-100 for lossy, 0-9 for lossless
    pub min_size_bytes: i64, // Minimum file size to compress
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            method: CompressionMethod::Lossless,
            quality_level: 75,
            min_size_bytes: 10240,
        }
    }
}

/// Result from a compression operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionResult {
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(alias = "original_size", alias = "bytesBefore")]
    pub bytes_before: i64,
    #[serde(alias = "compressed_size", alias = "bytesAfter")]
    pub bytes_after: i64,
    #[serde(alias = "space_saved_percentage", alias = "percentSaved")]
    pub percent_saved: f64,
    #[serde(default)]
    pub compressed_file_path: Option<String>,
    #[serde(default)]
    pub method_used: Option<CompressionMethod>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
}

impl CompressionResult {
    pub fn bytes_saved(&self) -> i64 {
        (self.bytes_before - self.bytes_after).max(0)
    }
}

/// Status of the compression queue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionQueueStatus {
    pub pending_count: i64,
    pub processing_count: i64,
    pub completed_count: i64,
    pub failed_count: i64,
    pub skipped_count: i64,
}

/// Compression statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionStats {
    pub total_original_size: i64,
    pub total_compressed_size: i64,
    pub space_saved: i64,
    pub compression_ratio: f64,
    pub total_files_compressed: i64,
    pub total_files_pending: i64,
    pub total_files_failed: i64,
    pub total_files_skipped: i64,
    pub last_compression_date: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Compression history of one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentCompressionHistory {
    pub document_id: String,
    pub current_status: String,
    #[serde(default)]
    pub original_size: Option<i64>,
    #[serde(default)]
    pub compressed_size: Option<i64>,
    #[serde(default)]
    pub space_saved: Option<i64>,
    #[serde(default)]
    pub compressed_path: Option<String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub queue_status: Option<String>,
    #[serde(default)]
    pub attempts: Option<i32>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub queued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub queue_updated_at: Option<DateTime<Utc>>,
}

/// Worker throttling as reported by the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerThrottleStatus {
    pub active_jobs: usize,
    pub max_concurrent_jobs: usize,
    pub effective_max_jobs: usize,
    pub is_throttled: bool,
    pub throttle_reason: Option<String>,
}

/// Aggregate returned by `compression_get_comprehensive_ios_status`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComprehensiveStatus {
    pub queue_status: Option<CompressionQueueStatus>,
    pub ios_worker_status: Option<WorkerThrottleStatus>,
    pub device_capabilities: Option<DeviceCapabilities>,
    pub compression_stats: Option<CompressionStats>,
}

/// How a `queue_document` request was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueueOutcome {
    Queued,
    /// Already queued; the priority update was applied instead
    PriorityUpdated { updated: bool },
}

// -----------------------------------------------------------------------------
// Request / response DTOs --------------------------------------------------------
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct DocumentRequest<'a> {
    pub document_id: &'a DocumentId,
}

#[derive(Debug, Serialize)]
pub(crate) struct PriorityRequest<'a> {
    pub document_id: &'a DocumentId,
    pub priority: CompressionPriority,
}

#[derive(Debug, Serialize)]
pub(crate) struct CompressRequest<'a> {
    pub document_id: &'a DocumentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<&'a CompressionConfig>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdatedResponse {
    pub updated: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CancelledResponse {
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BackgroundExtension {
    pub granted_seconds: u32,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct VisibilityHint {
    pub is_visible: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LifecycleHint {
    pub event: &'static str,
}
