use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::envelope::ErrorKind;

// ============================================================================
// Validation Findings
// ============================================================================

/// A single rule violation, either blocking or advisory depending on where
/// it is filed in a `ValidationOutcome`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Field path, e.g. `total_amount` or `items[2].quantity`
    pub field: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
            order_id: None,
        }
    }

    pub fn with_value(mut self, value: Option<&Value>) -> Self {
        self.value = value.cloned();
        self
    }

    pub fn for_order(mut self, order_id: Option<&str>) -> Self {
        self.order_id = order_id.map(str::to_string);
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub blocking: Vec<ValidationError>,
    pub advisory: Vec<ValidationError>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.blocking.is_empty()
    }

    pub fn block(&mut self, error: ValidationError) {
        self.blocking.push(error);
    }

    pub fn advise(&mut self, error: ValidationError) {
        self.advisory.push(error);
    }

    /// Blocking errors joined into one line
    pub fn summary(&self) -> String {
        self.blocking
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ============================================================================
// Faults
// ============================================================================

/// Unexpected internal conditions. Bad data never ends up here.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsFault {
    #[error("Arithmetic overflow while accumulating {field} for order {order_id}")]
    Overflow { field: &'static str, order_id: String },

    #[error("Invariant violated during {operation}: {detail}")]
    InvariantViolated { operation: &'static str, detail: String },
}

impl AnalyticsFault {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Unknown
    }

    pub fn order_id(&self) -> Option<&str> {
        match self {
            AnalyticsFault::Overflow { order_id, .. } => Some(order_id),
            AnalyticsFault::InvariantViolated { .. } => None,
        }
    }
}

/// Foreign-key violation reported by the storage collaborator
pub const FOREIGN_KEY_VIOLATION: &str = "23503";
/// Unique-key violation reported by the storage collaborator
pub const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Constraint violation ({code}): {message}")]
    Constraint { code: String, message: String },

    #[error("Storage error: {0}")]
    Other(String),

    #[error("Unexpected storage failure: {0}")]
    Unexpected(String),
}

impl RepositoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepositoryError::Unavailable(_) | RepositoryError::Other(_) => ErrorKind::Database,
            RepositoryError::Constraint { .. } => ErrorKind::Validation,
            RepositoryError::Unexpected(_) => ErrorKind::Unknown,
        }
    }

    /// Caller-facing message; storage internals stay in the details
    pub fn public_message(&self) -> String {
        match self {
            RepositoryError::Constraint { code, .. } if code == FOREIGN_KEY_VIOLATION => {
                "Referenced customer does not exist".to_string()
            }
            RepositoryError::Constraint { code, .. } if code == UNIQUE_VIOLATION => {
                "Order already exists".to_string()
            }
            RepositoryError::Constraint { message, .. } => {
                format!("Constraint violation: {}", message)
            }
            RepositoryError::Unavailable(message) | RepositoryError::Other(message) => {
                format!("Database error: {}", message)
            }
            RepositoryError::Unexpected(_) => "An unexpected error occurred".to_string(),
        }
    }
}
