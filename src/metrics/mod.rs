use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Orders accepted and skipped per operation
// - Items excluded from aggregation
// - Failures by operation and error kind
// - Operation latency
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the service
pub struct Metrics {
    registry: Registry,

    pub orders_processed: IntCounterVec,
    pub orders_skipped: IntCounterVec,
    pub items_skipped: IntCounterVec,
    pub operation_failures: IntCounterVec,
    pub operation_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_processed = IntCounterVec::new(
            Opts::new("orders_processed_total", "Orders accepted for processing"),
            &["operation"],
        )?;
        registry.register(Box::new(orders_processed.clone()))?;

        let orders_skipped = IntCounterVec::new(
            Opts::new("orders_skipped_total", "Orders skipped because of blocking validation errors"),
            &["operation"],
        )?;
        registry.register(Box::new(orders_skipped.clone()))?;

        let items_skipped = IntCounterVec::new(
            Opts::new("items_skipped_total", "Order items excluded from aggregation"),
            &["operation"],
        )?;
        registry.register(Box::new(items_skipped.clone()))?;

        let operation_failures = IntCounterVec::new(
            Opts::new("operation_failures_total", "Operations that ended in a failure envelope"),
            &["operation", "kind"],
        )?;
        registry.register(Box::new(operation_failures.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new("operation_duration_seconds", "Service operation duration")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            registry,
            orders_processed,
            orders_skipped,
            items_skipped,
            operation_failures,
            operation_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record the partition tally of one operation
    pub fn record_partition(&self, operation: &str, processed: usize, skipped: usize, skipped_items: usize) {
        self.orders_processed.with_label_values(&[operation]).inc_by(processed as u64);
        self.orders_skipped.with_label_values(&[operation]).inc_by(skipped as u64);
        self.items_skipped.with_label_values(&[operation]).inc_by(skipped_items as u64);
    }

    pub fn record_failure(&self, operation: &str, kind: &str) {
        self.operation_failures.with_label_values(&[operation, kind]).inc();
    }

    pub fn observe_duration(&self, operation: &str, duration_secs: f64) {
        self.operation_duration.with_label_values(&[operation]).observe(duration_secs);
    }

    /// Text exposition format for scraping
    pub fn render(&self) -> anyhow::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}
