use serde::Serialize;
use serde_json::{json, Value};

use crate::diagnostics::{fields, DiagnosticSink};
use super::errors::ValidationError;
use super::validator::{declared_id, json_type_name, SchemaValidator};
use super::value_objects::Order;

// ============================================================================
// Record Partitioner
// ============================================================================
//
// Splits an untrusted collection into accepted orders and a skip tally.
// Never fails: an absent or wrongly-shaped collection is "zero accepted
// records" plus a warning. Accepted orders keep input order.
//
// ============================================================================

pub const MISSING_COLLECTION_WARNING: &str = "Orders array was undefined or null";
pub const NOT_A_SEQUENCE_WARNING: &str = "Orders input is not an array";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Partition {
    pub accepted: Vec<Order>,
    pub skipped_count: usize,
    pub warnings: Vec<String>,
}

pub struct RecordPartitioner<'a> {
    validator: &'a SchemaValidator,
    validation_enabled: bool,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> RecordPartitioner<'a> {
    pub fn new(validator: &'a SchemaValidator, validation_enabled: bool, sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            validator,
            validation_enabled,
            sink,
        }
    }

    /// `None` and JSON `null` both mean the caller supplied nothing
    pub fn partition(&self, raw: Option<&Value>) -> Partition {
        let mut partition = Partition::default();

        let records = match raw {
            None | Some(Value::Null) => {
                self.sink.warn(MISSING_COLLECTION_WARNING, None);
                partition.warnings.push(MISSING_COLLECTION_WARNING.to_string());
                return partition;
            }
            Some(Value::Array(records)) => records,
            Some(other) => {
                self.sink.warn(
                    NOT_A_SEQUENCE_WARNING,
                    Some(&fields([("received", json!(json_type_name(other)))])),
                );
                partition.warnings.push(NOT_A_SEQUENCE_WARNING.to_string());
                return partition;
            }
        };

        for (index, record) in records.iter().enumerate() {
            if self.validation_enabled {
                self.admit_validated(index, record, &mut partition);
            } else {
                self.admit_unchecked(index, record, &mut partition);
            }
        }

        self.sink.debug(
            "Partitioned order collection",
            Some(&fields([
                ("received", json!(records.len())),
                ("accepted", json!(partition.accepted.len())),
                ("skipped", json!(partition.skipped_count)),
            ])),
        );

        partition
    }

    fn admit_validated(&self, index: usize, record: &Value, partition: &mut Partition) {
        match self.validator.narrow(record) {
            Ok((order, advisory)) => {
                for finding in &advisory {
                    partition.warnings.push(advisory_warning(&order.id, finding));
                }
                if !advisory.is_empty() {
                    self.sink.debug(
                        "Accepted order with advisory findings",
                        Some(&fields([
                            ("order_id", json!(order.id)),
                            ("advisories", json!(advisory.len())),
                        ])),
                    );
                }
                partition.accepted.push(order);
            }
            Err(outcome) => {
                let warning = format!(
                    "Skipped invalid order {}: {}",
                    position_label(index, record),
                    outcome.summary()
                );
                self.sink.warn(
                    &warning,
                    Some(&fields([
                        ("index", json!(index)),
                        ("order_id", json!(declared_id(record))),
                        ("errors", json!(outcome.blocking)),
                    ])),
                );
                partition.warnings.push(warning);
                partition.skipped_count += 1;
            }
        }
    }

    fn admit_unchecked(&self, index: usize, record: &Value, partition: &mut Partition) {
        match self.validator.narrow_unchecked(record) {
            Some(order) => partition.accepted.push(order),
            None => {
                let warning = format!(
                    "Skipped invalid order {}: $record: Missing or malformed record",
                    position_label(index, record)
                );
                self.sink.warn(&warning, Some(&fields([("index", json!(index))])));
                partition.warnings.push(warning);
                partition.skipped_count += 1;
            }
        }
    }
}

/// Declared id when present, else the element's index
fn position_label(index: usize, record: &Value) -> String {
    match declared_id(record) {
        Some(id) => id.to_string(),
        None => format!("at index {}", index),
    }
}

fn advisory_warning(order_id: &str, finding: &ValidationError) -> String {
    format!("Order {}: {} ({})", order_id, finding.message, finding.field)
}

// ============================================================================
// Unit Tests
// ============================================================================
