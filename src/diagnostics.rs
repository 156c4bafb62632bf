use serde_json::{Map, Value};

// ============================================================================
// Diagnostic Sink
// ============================================================================
//
// The narrow logging capability the engine depends on. Services hold an
// `Arc<dyn DiagnosticSink>`; the default forwards to `tracing`, and `NoopSink`
// stands in when logging is switched off.
//
// ============================================================================

pub type LogFields = Map<String, Value>;

pub trait DiagnosticSink: Send + Sync {
    fn info(&self, message: &str, fields: Option<&LogFields>);
    fn warn(&self, message: &str, fields: Option<&LogFields>);
    fn error(&self, message: &str, fields: Option<&LogFields>);
    fn debug(&self, message: &str, fields: Option<&LogFields>);
}

/// Build a field payload from key/value pairs
pub fn fields<K, I>(pairs: I) -> LogFields
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Keys recorded as first-class `tracing` fields instead of inside `fields`
const PROMOTED_KEYS: [&str; 2] = ["operation", "order_id"];

fn text<'a>(fields: Option<&'a LogFields>, key: &str) -> Option<&'a str> {
    fields.and_then(|map| map.get(key)).and_then(Value::as_str)
}

/// Everything not promoted, as one JSON object; empty when nothing is left
fn render(fields: Option<&LogFields>) -> String {
    let Some(map) = fields else {
        return String::new();
    };
    let rest: LogFields = map
        .iter()
        .filter(|(key, value)| !(PROMOTED_KEYS.contains(&key.as_str()) && value.is_string()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if rest.is_empty() {
        String::new()
    } else {
        Value::Object(rest).to_string()
    }
}

macro_rules! emit {
    ($level:ident, $message:expr, $fields:expr) => {
        tracing::$level!(
            operation = text($fields, "operation"),
            order_id = text($fields, "order_id"),
            fields = %render($fields),
            "{}",
            $message
        )
    };
}

/// Forwards every event to the `tracing` macros. `operation` and `order_id`
/// become event fields; the remaining payload is rendered under `fields`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn info(&self, message: &str, fields: Option<&LogFields>) {
        emit!(info, message, fields);
    }

    fn warn(&self, message: &str, fields: Option<&LogFields>) {
        emit!(warn, message, fields);
    }

    fn error(&self, message: &str, fields: Option<&LogFields>) {
        emit!(error, message, fields);
    }

    fn debug(&self, message: &str, fields: Option<&LogFields>) {
        emit!(debug, message, fields);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn info(&self, _message: &str, _fields: Option<&LogFields>) {}
    fn warn(&self, _message: &str, _fields: Option<&LogFields>) {}
    fn error(&self, _message: &str, _fields: Option<&LogFields>) {}
    fn debug(&self, _message: &str, _fields: Option<&LogFields>) {}
}
