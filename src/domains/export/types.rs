use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// CSV writer options understood by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub quote_char: u8,
    pub escape_char: Option<u8>,
    pub compress: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote_char: b'"',
            escape_char: None,
            compress: false,
        }
    }
}

/// Parquet compression options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParquetCompression {
    None,
    Snappy,
    Gzip,
    Lzo,
    Brotli,
    Lz4,
    Zstd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParquetOptions {
    pub compression: ParquetCompression,
    pub row_group_size: usize,
    pub enable_statistics: bool,
}

impl Default for ParquetOptions {
    fn default() -> Self {
        Self {
            compression: ParquetCompression::Snappy,
            row_group_size: 10_000,
            enable_statistics: true,
        }
    }
}

/// Export formats supported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    JsonLines,
    Csv(CsvOptions),
    Parquet(ParquetOptions),
}

impl ExportFormat {
    pub fn csv() -> Self {
        ExportFormat::Csv(CsvOptions::default())
    }

    pub fn parquet() -> Self {
        ExportFormat::Parquet(ParquetOptions::default())
    }

    /// Get file extension for this format
    pub fn file_extension(&self) -> &'static str {
        match self {
            ExportFormat::JsonLines => "jsonl",
            ExportFormat::Csv(_) => "csv",
            ExportFormat::Parquet(_) => "parquet",
        }
    }
}

// The engine expects Swift's enum encoding: associated values under "_0"
#[derive(Serialize)]
struct Associated<'a, T> {
    #[serde(rename = "_0")]
    value: &'a T,
}

impl Serialize for ExportFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ExportFormat::JsonLines => serializer.serialize_str("jsonLines"),
            ExportFormat::Csv(options) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("csv", &Associated { value: options })?;
                map.end()
            }
            ExportFormat::Parquet(options) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("parquet", &Associated { value: options })?;
                map.end()
            }
        }
    }
}

/// Export job statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportStatus {
    #[serde(alias = "Queued", alias = "Pending")]
    Requested,
    #[serde(alias = "Running")]
    InProgress,
    Completed,
    Failed,
}

impl ExportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportStatus::Completed | ExportStatus::Failed)
    }
}

/// Latest engine snapshot of an export job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    pub id: Uuid,
    pub status: ExportStatus,
    #[serde(default)]
    pub total_entities: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub local_path: Option<String>,
    #[serde(default)]
    pub total_bytes: Option<i64>,
    #[serde(default)]
    pub requested_at: Option<DateTime<Utc>>,
}

/// `{"job": {...}}` as returned by submit and status calls
#[derive(Debug, Deserialize)]
pub(crate) struct JobEnvelope {
    pub job: ExportJob,
}

/// One export invocation; consumed by a single coordinator call
#[derive(Clone)]
pub struct ExportRequest {
    pub ids: Vec<String>,
    pub include_blobs: bool,
    pub format: ExportFormat,
    pub target_path: PathBuf,
    pub auth_token: String,
}

impl fmt::Debug for ExportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportRequest")
            .field("ids", &self.ids)
            .field("include_blobs", &self.include_blobs)
            .field("format", &self.format)
            .field("target_path", &self.target_path)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

/// Options JSON for `export_<domain>_by_ids`
#[derive(Debug, Serialize)]
pub(crate) struct ExportByIdsOptions<'a> {
    pub ids: &'a [String],
    pub include_blobs: bool,
    pub target_path: String,
    pub format: &'a ExportFormat,
}

impl<'a> From<&'a ExportRequest> for ExportByIdsOptions<'a> {
    fn from(request: &'a ExportRequest) -> Self {
        Self {
            ids: &request.ids,
            include_blobs: request.include_blobs,
            target_path: request.target_path.to_string_lossy().into_owned(),
            format: &request.format,
        }
    }
}

/// Terminal result of `export_selected_items`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExportOutcome {
    /// Nothing was selected; no engine call was made
    NoSelection,
    Exported {
        job_id: Uuid,
        path: PathBuf,
        total_entities: i64,
    },
    /// The job completed but wrote nothing
    NoRecordsExported { job_id: Uuid, path: PathBuf },
}

impl ExportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExportOutcome::Exported { .. })
    }

    pub fn message(&self) -> String {
        match self {
            ExportOutcome::NoSelection => "Nothing selected".to_string(),
            ExportOutcome::Exported { total_entities, .. } => format!("Exported {} records", total_entities),
            ExportOutcome::NoRecordsExported { .. } => "No records exported".to_string(),
        }
    }
}

/// Where an export invocation currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExportPhase {
    Idle,
    Submitting,
    Polling { attempt: u32 },
    Succeeded,
    Failed,
    TimedOut,
}
