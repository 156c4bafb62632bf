use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::config::AnalyticsConfig;
use crate::diagnostics::{fields, DiagnosticSink, NoopSink, TracingSink};
use crate::envelope::{ResponseMeta, ResultEnvelope};
use crate::metrics::Metrics;

use super::aggregation::{
    self, Aggregation, CalculationBreakdown, ExtendedOrderStatistics, OrderStatistics, OrderTotals,
};
use super::errors::AnalyticsFault;
use super::partitioner::{Partition, RecordPartitioner};
use super::validator::SchemaValidator;

// ============================================================================
// Order Analytics Service
// ============================================================================
//
// Orchestrates: raw collection → Partitioner → Aggregation → Envelope
//
// Stateless apart from configuration; every call is a pure function of its
// input and safe to run concurrently on a shared instance.
//
// ============================================================================

pub const NO_VALID_ORDERS: &str = "No valid orders found";

#[derive(Clone)]
pub struct OrderAnalyticsService {
    validator: SchemaValidator,
    validation_enabled: bool,
    sink: Arc<dyn DiagnosticSink>,
    metrics: Option<Arc<Metrics>>,
}

impl OrderAnalyticsService {
    pub fn new(config: AnalyticsConfig) -> Self {
        let sink: Arc<dyn DiagnosticSink> = if config.logging_enabled {
            Arc::new(TracingSink)
        } else {
            Arc::new(NoopSink)
        };

        Self {
            validator: SchemaValidator::new(config.rules),
            validation_enabled: config.validation_enabled,
            sink,
            metrics: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Revenue, item count, order count and average over the valid subset
    pub fn calculate_order_totals(&self, orders: Option<&Value>) -> ResultEnvelope<OrderTotals> {
        self.run("totals", orders, aggregation::totals, |partition, agg| {
            let message = if agg.value.total_orders == 0 {
                NO_VALID_ORDERS
            } else {
                "Order totals calculated successfully"
            };
            let meta = merged_meta(partition, agg.warnings);
            ResultEnvelope::success(agg.value, message, meta)
        })
    }

    /// Totals plus per-status order counts
    pub fn get_order_statistics(&self, orders: Option<&Value>) -> ResultEnvelope<OrderStatistics> {
        self.run("statistics", orders, aggregation::statistics, |partition, agg| {
            let message = if agg.value.total_orders == 0 {
                NO_VALID_ORDERS
            } else {
                "Order statistics calculated successfully"
            };
            let meta = merged_meta(partition, agg.warnings);
            ResultEnvelope::success(agg.value, message, meta)
        })
    }

    /// Statistics plus per-status revenue, top customers and date range
    pub fn get_extended_statistics(&self, orders: Option<&Value>) -> ResultEnvelope<ExtendedOrderStatistics> {
        self.run("extended", orders, aggregation::extended_statistics, |partition, agg| {
            let message = if agg.value.statistics.total_orders == 0 {
                NO_VALID_ORDERS
            } else {
                "Extended statistics calculated successfully"
            };
            let meta = merged_meta(partition, agg.warnings);
            ResultEnvelope::success(agg.value, message, meta)
        })
    }

    /// Totals with skip counts and every warning inside the payload
    pub fn get_calculation_breakdown(&self, orders: Option<&Value>) -> ResultEnvelope<CalculationBreakdown> {
        self.run("breakdown", orders, aggregation::totals, |partition, agg| {
            let message = if agg.value.total_orders == 0 {
                NO_VALID_ORDERS
            } else {
                "Calculation breakdown generated"
            };
            let meta = merged_meta(partition, agg.warnings);
            let breakdown = CalculationBreakdown {
                totals: agg.value,
                processed_orders: meta.processed_count,
                skipped_orders: meta.skipped_count,
                warnings: meta.warnings.clone(),
            };
            ResultEnvelope::success(breakdown, message, meta)
        })
    }

    fn run<A, T>(
        &self,
        operation: &'static str,
        orders: Option<&Value>,
        aggregate: impl FnOnce(&[super::Order]) -> Result<Aggregation<A>, AnalyticsFault>,
        finish: impl FnOnce(&Partition, Aggregation<A>) -> ResultEnvelope<T>,
    ) -> ResultEnvelope<T> {
        let started = Instant::now();
        self.sink.debug(
            "Starting order analytics",
            Some(&fields([("operation", json!(operation))])),
        );

        let partition =
            RecordPartitioner::new(&self.validator, self.validation_enabled, self.sink.as_ref())
                .partition(orders);

        let envelope = match aggregate(&partition.accepted) {
            Ok(agg) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_partition(
                        operation,
                        partition.accepted.len(),
                        partition.skipped_count,
                        aggregation::skipped_items(&partition.accepted),
                    );
                }
                self.sink.info(
                    "Order analytics completed",
                    Some(&fields([
                        ("operation", json!(operation)),
                        ("processed", json!(partition.accepted.len())),
                        ("skipped", json!(partition.skipped_count)),
                    ])),
                );
                finish(&partition, agg)
            }
            Err(fault) => self.fault(operation, fault),
        };

        if let Some(metrics) = &self.metrics {
            metrics.observe_duration(operation, started.elapsed().as_secs_f64());
        }
        envelope
    }

    fn fault<T>(&self, operation: &'static str, fault: AnalyticsFault) -> ResultEnvelope<T> {
        let kind = fault.kind();
        let mut details = fields([
            ("operation", json!(operation)),
            ("error", json!(fault.to_string())),
        ]);
        if let Some(order_id) = fault.order_id() {
            details.insert("order_id".to_string(), json!(order_id));
        }

        self.sink.error("Order analytics failed", Some(&details));
        if let Some(metrics) = &self.metrics {
            metrics.record_failure(operation, kind.as_str());
        }

        ResultEnvelope::failure(kind, format!("Failed to compute {}: {}", operation, fault), details)
    }
}

fn merged_meta(partition: &Partition, item_warnings: Vec<String>) -> ResponseMeta {
    let mut warnings = partition.warnings.clone();
    warnings.extend(item_warnings);
    ResponseMeta {
        processed_count: partition.accepted.len(),
        skipped_count: partition.skipped_count,
        warnings,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
