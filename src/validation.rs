use crate::errors::{ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest document id the engine will accept
pub const MAX_DOCUMENT_ID_LEN: usize = 128;

/// Struct for configuring validations in a fluent style
pub struct ValidationBuilder<T> {
    field_name: String,
    value: Option<T>,
    errors: Vec<ValidationError>,
}

impl<T> ValidationBuilder<T> {
    pub fn new(field_name: &str, value: Option<T>) -> Self {
        Self {
            field_name: field_name.to_string(),
            value,
            errors: Vec::new(),
        }
    }

    /// Complete validation and return the first error, if any
    pub fn validate(mut self) -> ValidationResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors.swap_remove(0))
        }
    }
}

/// String-specific validations
impl<S: AsRef<str>> ValidationBuilder<S> {
    /// Blank and whitespace-only strings count as missing.
    pub fn required(mut self) -> Self {
        let missing = match &self.value {
            Some(value) => value.as_ref().trim().is_empty(),
            None => true,
        };
        if missing {
            self.errors.push(ValidationError::required(&self.field_name));
        }
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        if let Some(value) = &self.value {
            if value.as_ref().chars().count() > max {
                self.errors.push(ValidationError::max_length(&self.field_name, max));
            }
        }
        self
    }

    pub fn no_control_chars(mut self) -> Self {
        if let Some(value) = &self.value {
            if value.as_ref().chars().any(char::is_control) {
                self.errors.push(ValidationError::invalid_value(
                    &self.field_name,
                    "must not contain control characters",
                ));
            }
        }
        self
    }
}

/// A document id that has passed local validation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(value: &str) -> ValidationResult<Self> {
        ValidationBuilder::new("document_id", Some(value))
            .required()
            .max_length(MAX_DOCUMENT_ID_LEN)
            .no_control_chars()
            .validate()?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reject serialized requests larger than `max` bytes
pub fn ensure_payload_within(call: &str, payload: &str, max: usize) -> ValidationResult<()> {
    if payload.len() > max {
        return Err(ValidationError::payload_too_large(call, payload.len(), max));
    }
    Ok(())
}
