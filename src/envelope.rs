use serde::Serialize;
use serde_json::{Map, Value};

// ============================================================================
// Result Envelope
// ============================================================================
//
// Every public service operation answers with one of these. Malformed input
// data is a degraded `Success` carrying warnings; `Failure` is reserved for
// faults (storage errors, arithmetic overflow, broken invariants) and for
// caller-supplied parameters that cannot be acted on.
//
// ============================================================================

/// Closed set of failure classifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Database,
    NotFound,
    InvalidInput,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Database => "database",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Unknown => "unknown",
        }
    }
}

/// Provenance attached to every success
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseMeta {
    pub processed_count: usize,
    pub skipped_count: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResultEnvelope<T> {
    Success {
        data: T,
        message: String,
        meta: ResponseMeta,
    },
    Failure {
        kind: ErrorKind,
        message: String,
        details: Map<String, Value>,
    },
}

impl<T> ResultEnvelope<T> {
    pub fn success(data: T, message: impl Into<String>, meta: ResponseMeta) -> Self {
        ResultEnvelope::Success {
            data,
            message: message.into(),
            meta,
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>, details: Map<String, Value>) -> Self {
        ResultEnvelope::Failure {
            kind,
            message: message.into(),
            details,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResultEnvelope::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ResultEnvelope::Success { data, .. } => Some(data),
            ResultEnvelope::Failure { .. } => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            ResultEnvelope::Success { data, .. } => Some(data),
            ResultEnvelope::Failure { .. } => None,
        }
    }

    pub fn meta(&self) -> Option<&ResponseMeta> {
        match self {
            ResultEnvelope::Success { meta, .. } => Some(meta),
            ResultEnvelope::Failure { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ResultEnvelope::Success { message, .. } | ResultEnvelope::Failure { message, .. } => message,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ResultEnvelope::Success { .. } => None,
            ResultEnvelope::Failure { kind, .. } => Some(*kind),
        }
    }
}
