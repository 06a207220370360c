use std::fmt;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Validation errors raised locally, before anything reaches the engine
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required {
        field: String,
    },

    #[error("Field '{field}' cannot exceed {max} characters")]
    MaxLength {
        field: String,
        max: usize,
    },

    #[error("Request for '{call}' is {size} bytes, limit is {max}")]
    PayloadTooLarge {
        call: String,
        size: usize,
        max: usize,
    },

    #[error("Field '{field}' contains an invalid value: {reason}")]
    InvalidValue {
        field: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    Custom(String),
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        Self::Required {
            field: field.to_string(),
        }
    }

    pub fn max_length(field: &str, max: usize) -> Self {
        Self::MaxLength {
            field: field.to_string(),
            max,
        }
    }

    pub fn payload_too_large(call: &str, size: usize, max: usize) -> Self {
        Self::PayloadTooLarge {
            call: call.to_string(),
            size,
            max,
        }
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn custom(message: &str) -> Self {
        Self::Custom(message.to_string())
    }
}

/// Why the engine refused a `queue_document` request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueueRejection {
    InvalidId,
    NotFound,
    Unknown(i32),
}

impl fmt::Display for QueueRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueRejection::InvalidId => write!(f, "invalid document id"),
            QueueRejection::NotFound => write!(f, "document not found"),
            QueueRejection::Unknown(code) => write!(f, "unknown status {}", code),
        }
    }
}

/// Service-level errors surfaced to the shell
#[derive(Debug, Error, Clone, Serialize)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to encode {call} request: {message}")]
    Encode {
        call: String,
        message: String,
    },

    #[error("Engine rejected {call} (status {code}): {message}")]
    EngineRejected {
        call: String,
        code: i32,
        message: String,
    },

    #[error("Engine call {call} failed: {message}")]
    Transport {
        call: String,
        message: String,
    },

    #[error("Failed to decode {call} response: {message}")]
    Decode {
        call: String,
        message: String,
    },

    #[error("Queue request for {document_id} rejected ({reason}): {message}")]
    QueueRejected {
        document_id: String,
        reason: QueueRejection,
        message: String,
    },

    #[error("Export job {job_id} failed: {message}")]
    JobFailed {
        job_id: Uuid,
        message: String,
    },

    #[error("Export job {job_id} still running after {attempts} status checks; it may still complete")]
    Timeout {
        job_id: Uuid,
        attempts: u32,
    },

    #[error("An export is already running on this coordinator")]
    ExportInProgress,

    #[error("Background execution window has closed")]
    ResourceBudgetExpired,

    #[error("Coordinator unavailable: {0}")]
    CoordinatorUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ServiceError {
    /// True when the underlying engine job may still finish on its own.
    pub fn may_still_complete(&self) -> bool {
        matches!(self, ServiceError::Timeout { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ServiceError::Validation(_))
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(error: std::io::Error) -> Self {
        ServiceError::Io(error.to_string())
    }
}
