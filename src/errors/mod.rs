mod error;

pub use error::{QueueRejection, ServiceError, ValidationError};

/// Result type for local validation
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type for coordinator and engine operations
pub type ServiceResult<T> = Result<T, ServiceError>;
