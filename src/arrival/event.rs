//! Normalized arrival events and payload validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Which call site produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSource {
    /// Prescription ready for pickup, pushed over the channel.
    Pharmacy,
    /// Clinic queue number now being served, detected by polling.
    Clinic,
}

impl fmt::Display for CallSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallSource::Pharmacy => write!(f, "pharmacy"),
            CallSource::Clinic => write!(f, "clinic"),
        }
    }
}

/// De-duplication key: identifiers are only unique per call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallKey {
    pub source: CallSource,
    pub identifier: String,
}

/// One queue item that is ready to be called.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalEvent {
    pub source: CallSource,
    /// Prescription number or queue number.
    pub identifier: String,
    /// Person to call.
    pub subject_name: String,
    /// Visit/registration number, or the serving room for clinic calls.
    pub related_code: String,
    pub received_at: DateTime<Utc>,
}

impl ArrivalEvent {
    /// Creates an event stamped with the current time.
    pub fn new(
        source: CallSource,
        identifier: impl Into<String>,
        subject_name: impl Into<String>,
        related_code: impl Into<String>,
    ) -> Self {
        Self {
            source,
            identifier: identifier.into(),
            subject_name: subject_name.into(),
            related_code: related_code.into(),
            received_at: Utc::now(),
        }
    }

    /// Shorthand for a pharmacy pickup event.
    pub fn pharmacy(
        identifier: impl Into<String>,
        subject_name: impl Into<String>,
        related_code: impl Into<String>,
    ) -> Self {
        Self::new(CallSource::Pharmacy, identifier, subject_name, related_code)
    }

    pub fn key(&self) -> CallKey {
        CallKey {
            source: self.source,
            identifier: self.identifier.clone(),
        }
    }

    /// Normalizes a raw push payload into a pharmacy event.
    ///
    /// Requires `identifier`, `subjectName` and `relatedCode`; each may be a
    /// JSON string or number. Any other field is ignored.
    pub fn from_payload(payload: &Value) -> Result<Self, PayloadError> {
        let object = payload.as_object().ok_or(PayloadError::NotAnObject)?;

        let identifier = required_field(object, "identifier")?;
        let subject_name = required_field(object, "subjectName")?;
        let related_code = required_field(object, "relatedCode")?;

        Ok(Self::pharmacy(identifier, subject_name, related_code))
    }
}

/// Reasons a push payload is dropped at the channel boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' must be a string or number, got {kind}")]
    InvalidField { field: &'static str, kind: &'static str },

    #[error("field '{0}' is blank")]
    BlankField(&'static str),
}

fn required_field(
    object: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<String, PayloadError> {
    let value = match object.get(field) {
        None | Some(Value::Null) => return Err(PayloadError::MissingField(field)),
        Some(value) => value,
    };

    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(_) => return Err(invalid(field, "boolean")),
        Value::Array(_) => return Err(invalid(field, "array")),
        Value::Object(_) => return Err(invalid(field, "object")),
        Value::Null => return Err(PayloadError::MissingField(field)),
    };

    if text.is_empty() {
        return Err(PayloadError::BlankField(field));
    }
    Ok(text)
}

fn invalid(field: &'static str, kind: &'static str) -> PayloadError {
    PayloadError::InvalidField { field, kind }
}
