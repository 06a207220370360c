// Engine status codes and the error envelope the engine writes into result buffers
use std::fmt;
use serde::{Deserialize, Serialize};

/// Status codes returned across the engine boundary
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Success (no error)
    Success = 0,

    // General errors (1-99)
    Unknown = 1,
    InvalidArgument = 2,
    NullPointer = 3,
    InvalidUtf8 = 4,
    InvalidUuid = 5,
    InternalError = 6,

    // Database errors (100-199)
    DatabaseGeneral = 100,
    DatabaseNotFound = 101,

    // Domain errors (200-299)
    DomainGeneral = 200,
    EntityNotFound = 201,
    AuthorizationFailed = 202,
    ValidationFailed = 204,
    FileError = 207,
    CompressionError = 208,

    // Service errors (300-399)
    ServiceGeneral = 300,
    AuthenticationFailed = 303,
    SessionExpired = 304,
    PermissionDenied = 305,
    ServiceUnavailable = 309,
}

impl ErrorCode {
    pub fn from_status(status: i32) -> Option<Self> {
        let code = match status {
            0 => ErrorCode::Success,
            1 => ErrorCode::Unknown,
            2 => ErrorCode::InvalidArgument,
            3 => ErrorCode::NullPointer,
            4 => ErrorCode::InvalidUtf8,
            5 => ErrorCode::InvalidUuid,
            6 => ErrorCode::InternalError,
            100 => ErrorCode::DatabaseGeneral,
            101 => ErrorCode::DatabaseNotFound,
            200 => ErrorCode::DomainGeneral,
            201 => ErrorCode::EntityNotFound,
            202 => ErrorCode::AuthorizationFailed,
            204 => ErrorCode::ValidationFailed,
            207 => ErrorCode::FileError,
            208 => ErrorCode::CompressionError,
            300 => ErrorCode::ServiceGeneral,
            303 => ErrorCode::AuthenticationFailed,
            304 => ErrorCode::SessionExpired,
            305 => ErrorCode::PermissionDenied,
            309 => ErrorCode::ServiceUnavailable,
            _ => return None,
        };
        Some(code)
    }

    /// Human-readable rendering of a raw status, known or not
    pub fn describe(status: i32) -> String {
        match Self::from_status(status) {
            Some(code) => code.to_string(),
            None => format!("status {}", status),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, *self as i32)
    }
}

/// `queue_document` reports its outcome through its own status table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatusCode {
    Queued,
    InvalidId,
    NotFound,
    AlreadyQueued,
    Other(i32),
}

impl From<i32> for QueueStatusCode {
    fn from(status: i32) -> Self {
        match status {
            0 => QueueStatusCode::Queued,
            1 => QueueStatusCode::InvalidId,
            2 => QueueStatusCode::NotFound,
            3 => QueueStatusCode::AlreadyQueued,
            other => QueueStatusCode::Other(other),
        }
    }
}

/// Error envelope the engine serializes into the result buffer
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineErrorPayload {
    pub code: serde_json::Value,
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
}

impl EngineErrorPayload {
    /// Parse `body` as an error envelope; data payloads yield `None`.
    pub fn parse(body: &str) -> Option<Self> {
        let payload: Self = serde_json::from_str(body).ok()?;
        if payload.is_success() {
            return None;
        }
        Some(payload)
    }

    fn is_success(&self) -> bool {
        match &self.code {
            serde_json::Value::String(code) => code == "Success",
            serde_json::Value::Number(code) => code.as_i64() == Some(0),
            _ => false,
        }
    }

    /// Numeric status for the envelope, falling back to `Unknown`
    pub fn status(&self) -> i32 {
        match &self.code {
            serde_json::Value::Number(code) => code
                .as_i64()
                .and_then(|code| i32::try_from(code).ok())
                .unwrap_or(ErrorCode::Unknown as i32),
            serde_json::Value::String(name) => serde_json::from_value::<ErrorCode>(serde_json::Value::String(name.clone()))
                .map(|code| code as i32)
                .unwrap_or(ErrorCode::Unknown as i32),
            _ => ErrorCode::Unknown as i32,
        }
    }

    pub fn full_message(&self) -> String {
        match &self.details {
            Some(details) => format!("{} ({})", self.message, details),
            None => self.message.clone(),
        }
    }
}
