use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::OrdersServiceConfig;
use crate::diagnostics::{fields, DiagnosticSink, NoopSink, TracingSink};
use crate::envelope::{ErrorKind, ResponseMeta, ResultEnvelope};
use crate::metrics::Metrics;

use super::aggregation::{self, OrderStats};
use super::commands::{CreateOrder, UpdateOrder};
use super::errors::RepositoryError;
use super::partitioner::{Partition, RecordPartitioner};
use super::repository::{OrderQuery, OrderRepository};
use super::validator::{is_uuid, SchemaValidator};
use super::value_objects::Order;

// ============================================================================
// Orders Service - CRUD over the order store
// ============================================================================
//
// Flow for reads:  Repository → raw rows → Partitioner → typed orders
// Flow for writes: Command → record → strict validation → Repository
//
// Rows coming back from storage are untrusted just like caller input: a
// malformed row is skipped with a warning, never surfaced as a failure.
// Storage errors are the only source of `Database` failures.
//
// ============================================================================

pub struct OrdersService {
    repository: Arc<dyn OrderRepository>,
    read_validator: SchemaValidator,
    write_validator: SchemaValidator,
    config: OrdersServiceConfig,
    sink: Arc<dyn DiagnosticSink>,
    metrics: Option<Arc<Metrics>>,
}

impl OrdersService {
    pub fn new(repository: Arc<dyn OrderRepository>, config: OrdersServiceConfig) -> Self {
        let sink: Arc<dyn DiagnosticSink> = if config.logging_enabled {
            Arc::new(TracingSink)
        } else {
            Arc::new(NoopSink)
        };

        Self {
            repository,
            read_validator: SchemaValidator::new(config.rules.clone()),
            write_validator: SchemaValidator::new(config.rules.clone().strict()),
            config,
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

    /// Raw stored collection for callers that analyse it themselves
    pub async fn load_collection<T>(&self, operation: &'static str) -> Result<Option<Value>, ResultEnvelope<T>> {
        self.repository
            .fetch_orders(&OrderQuery::default())
            .await
            .map_err(|e| self.storage_failure(operation, e))
    }

    pub async fn get_orders(&self, query: OrderQuery) -> ResultEnvelope<Vec<Order>> {
        let started = Instant::now();
        let operation = "get_orders";

        if let Some(customer_id) = &query.customer_id {
            if !is_uuid(customer_id) {
                let envelope = invalid_input("Invalid customer ID format", json!({ "customer_id": customer_id }));
                return self.finish(operation, started, envelope);
            }
        }

        let envelope = match self.repository.fetch_orders(&query).await {
            Ok(raw) => {
                let partition = self.partition(operation, raw.as_ref(), self.config.validation_enabled);
                let message = if partition.accepted.is_empty() {
                    "No orders found"
                } else {
                    "Orders retrieved successfully"
                };
                let meta = meta_of(&partition);
                ResultEnvelope::success(partition.accepted, message, meta)
            }
            Err(e) => self.storage_failure(operation, e),
        };

        self.finish(operation, started, envelope)
    }

    /// A missing or unusable row is a success carrying `None`
    pub async fn get_order_by_id(&self, id: &str) -> ResultEnvelope<Option<Order>> {
        let started = Instant::now();
        let operation = "get_order_by_id";

        if let Some(envelope) = check_order_id(id) {
            return self.finish(operation, started, envelope);
        }

        let envelope = match self.repository.fetch_order(id).await {
            Ok(None) => ResultEnvelope::success(None, "Order not found", ResponseMeta::default()),
            Ok(Some(row)) => {
                let partition = self.partition(operation, Some(&Value::Array(vec![row])), self.config.validation_enabled);
                let meta = meta_of(&partition);
                match partition.accepted.into_iter().next() {
                    Some(order) => ResultEnvelope::success(Some(order), "Order retrieved successfully", meta),
                    None => ResultEnvelope::success(None, "Stored order is invalid", meta),
                }
            }
            Err(e) => self.storage_failure(operation, e),
        };

        self.finish(operation, started, envelope)
    }

    pub async fn create_order(&self, command: CreateOrder) -> ResultEnvelope<Order> {
        let started = Instant::now();
        let operation = "create_order";

        let now = Utc::now().to_rfc3339();
        let status = command
            .status
            .unwrap_or_else(|| self.config.default_status.as_str().to_string());
        let record = json!({
            "id": Uuid::new_v4().to_string(),
            "customer_id": command.customer_id,
            "total_amount": command.total_amount,
            "status": status,
            "items": command.items,
            "created_at": now,
            "updated_at": now,
        });

        let mut warnings = Vec::new();
        if self.config.validation_enabled {
            let mut outcome = self.write_validator.validate(&record);
            if let Some(items) = record.get("items").and_then(Value::as_array) {
                for (index, item) in items.iter().enumerate() {
                    let item_outcome = self.write_validator.validate_item(item, &format!("items[{}]", index));
                    outcome.blocking.extend(item_outcome.blocking);
                }
            }
            if !outcome.is_valid() {
                let envelope = validation_failure(&outcome.summary(), json!(outcome.blocking));
                return self.finish(operation, started, envelope);
            }
            warnings.extend(outcome.advisory.iter().map(|finding| finding.to_string()));
        }

        let envelope = match self.repository.insert_order(record).await {
            Ok(Some(row)) => match self.read_validator.narrow_unchecked(&row) {
                Some(order) => {
                    self.sink.info(
                        "Order created",
                        Some(&fields([
                            ("order_id", json!(order.id)),
                            ("customer_id", json!(order.customer_id)),
                        ])),
                    );
                    let meta = ResponseMeta {
                        processed_count: 1,
                        skipped_count: 0,
                        warnings,
                    };
                    ResultEnvelope::success(order, "Order created successfully", meta)
                }
                None => self.storage_failure(
                    operation,
                    RepositoryError::Unexpected("stored order is not an object".to_string()),
                ),
            },
            Ok(None) => self.storage_failure(
                operation,
                RepositoryError::Unexpected("insert returned no row".to_string()),
            ),
            Err(e) => self.storage_failure(operation, e),
        };

        self.finish(operation, started, envelope)
    }

    pub async fn update_order(&self, id: &str, command: UpdateOrder) -> ResultEnvelope<Order> {
        let started = Instant::now();
        let operation = "update_order";

        if let Some(envelope) = check_order_id(id) {
            return self.finish(operation, started, envelope);
        }
        if command.is_empty() {
            let envelope = invalid_input("No fields to update", json!({ "order_id": id }));
            return self.finish(operation, started, envelope);
        }

        let mut changes = command.into_changes();
        if self.config.validation_enabled {
            let outcome = self.write_validator.validate_changes(&changes);
            if !outcome.is_valid() {
                let envelope = validation_failure(&outcome.summary(), json!(outcome.blocking));
                return self.finish(operation, started, envelope);
            }
        }
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let envelope = match self.repository.update_order(id, changes).await {
            Ok(None) => not_found(id),
            Ok(Some(row)) => match self.read_validator.narrow_unchecked(&row) {
                Some(order) => {
                    self.sink.info("Order updated", Some(&fields([("order_id", json!(id))])));
                    let meta = ResponseMeta {
                        processed_count: 1,
                        ..ResponseMeta::default()
                    };
                    ResultEnvelope::success(order, "Order updated successfully", meta)
                }
                None => self.storage_failure(
                    operation,
                    RepositoryError::Unexpected("stored order is not an object".to_string()),
                ),
            },
            Err(e) => self.storage_failure(operation, e),
        };

        self.finish(operation, started, envelope)
    }

    pub async fn delete_order(&self, id: &str) -> ResultEnvelope<bool> {
        let started = Instant::now();
        let operation = "delete_order";

        if let Some(envelope) = check_order_id(id) {
            return self.finish(operation, started, envelope);
        }

        let envelope = match self.repository.delete_order(id).await {
            Ok(true) => {
                self.sink.info("Order deleted", Some(&fields([("order_id", json!(id))])));
                let meta = ResponseMeta {
                    processed_count: 1,
                    ..ResponseMeta::default()
                };
                ResultEnvelope::success(true, "Order deleted successfully", meta)
            }
            Ok(false) => not_found(id),
            Err(e) => self.storage_failure(operation, e),
        };

        self.finish(operation, started, envelope)
    }

    /// Counts and amounts over the stored `total_amount` of every row.
    /// Rows are narrowed leniently: a missing or non-numeric amount counts
    /// as the lenient default and an unusable status lands in `unknown`.
    pub async fn get_order_stats(&self) -> ResultEnvelope<OrderStats> {
        let started = Instant::now();
        let operation = "get_order_stats";

        let envelope = match self.repository.fetch_orders(&OrderQuery::default()).await {
            Ok(raw) => {
                let partition = self.partition(operation, raw.as_ref(), false);
                match aggregation::stored_amount_stats(&partition.accepted) {
                    Ok(stats) => {
                        let meta = meta_of(&partition);
                        ResultEnvelope::success(stats, "Order statistics calculated successfully", meta)
                    }
                    Err(fault) => {
                        let details = fields([
                            ("operation", json!(operation)),
                            ("error", json!(fault.to_string())),
                        ]);
                        self.sink.error("Order statistics failed", Some(&details));
                        ResultEnvelope::failure(fault.kind(), fault.to_string(), details)
                    }
                }
            }
            Err(e) => self.storage_failure(operation, e),
        };

        self.finish(operation, started, envelope)
    }

    fn partition(&self, operation: &str, raw: Option<&Value>, validate: bool) -> Partition {
        let partition = RecordPartitioner::new(&self.read_validator, validate, self.sink.as_ref()).partition(raw);
        if let Some(metrics) = &self.metrics {
            metrics.record_partition(
                operation,
                partition.accepted.len(),
                partition.skipped_count,
                aggregation::skipped_items(&partition.accepted),
            );
        }
        partition
    }

    fn storage_failure<T>(&self, operation: &str, error: RepositoryError) -> ResultEnvelope<T> {
        let mut details = fields([
            ("operation", json!(operation)),
            ("error", json!(error.to_string())),
        ]);
        if let RepositoryError::Constraint { code, .. } = &error {
            details.insert("code".to_string(), json!(code));
        }

        self.sink.error("Order storage operation failed", Some(&details));
        ResultEnvelope::failure(error.kind(), error.public_message(), details)
    }

    fn finish<T>(&self, operation: &str, started: Instant, envelope: ResultEnvelope<T>) -> ResultEnvelope<T> {
        if let Some(metrics) = &self.metrics {
            if let Some(kind) = envelope.error_kind() {
                metrics.record_failure(operation, kind.as_str());
            }
            metrics.observe_duration(operation, started.elapsed().as_secs_f64());
        }
        envelope
    }
}

fn meta_of(partition: &Partition) -> ResponseMeta {
    ResponseMeta {
        processed_count: partition.accepted.len(),
        skipped_count: partition.skipped_count,
        warnings: partition.warnings.clone(),
    }
}

fn check_order_id<T>(id: &str) -> Option<ResultEnvelope<T>> {
    if id.trim().is_empty() {
        Some(invalid_input("Order ID is required", json!({ "order_id": id })))
    } else if !is_uuid(id) {
        Some(invalid_input("Invalid order ID format", json!({ "order_id": id })))
    } else {
        None
    }
}

fn invalid_input<T>(message: &str, details: Value) -> ResultEnvelope<T> {
    ResultEnvelope::failure(ErrorKind::InvalidInput, message, into_map(details))
}

fn validation_failure<T>(summary: &str, errors: Value) -> ResultEnvelope<T> {
    ResultEnvelope::failure(
        ErrorKind::Validation,
        format!("Validation failed: {}", summary),
        fields([("errors", errors)]),
    )
}

fn not_found<T>(id: &str) -> ResultEnvelope<T> {
    ResultEnvelope::failure(ErrorKind::NotFound, "Order not found", fields([("order_id", json!(id))]))
}

fn into_map(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::testing::{Level, RecordingSink};
    use crate::domain::order::errors::FOREIGN_KEY_VIOLATION;
    use crate::domain::order::partitioner::MISSING_COLLECTION_WARNING;
    use crate::domain::order::repository::InMemoryOrderRepository;
    use crate::domain::order::value_objects::OrderStatus;
    use async_trait::async_trait;
    use serde_json::Map;

    const CUSTOMER: &str = "6f1c2a4e-8d3b-4c5a-9e7f-1a2b3c4d5e6f";
    const ORDER_1: &str = "11111111-1111-4111-8111-111111111111";
    const ORDER_2: &str = "22222222-2222-4222-8222-222222222222";
    const MISSING: &str = "99999999-9999-4999-8999-999999999999";

    fn row(id: &str, status: &str, total_amount: f64) -> Value {
        json!({
            "id": id,
            "customer_id": CUSTOMER,
            "total_amount": total_amount,
            "status": status,
            "items": [],
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    fn service_over(table: Value) -> OrdersService {
        let repository = InMemoryOrderRepository::with_table(table).with_known_customers([CUSTOMER]);
        OrdersService::new(Arc::new(repository), OrdersServiceConfig::default())
    }

    fn create(total_amount: Value) -> CreateOrder {
        CreateOrder {
            customer_id: CUSTOMER.to_string(),
            total_amount,
            status: None,
            items: vec![],
        }
    }

    struct UnavailableRepository;

    #[async_trait]
    impl OrderRepository for UnavailableRepository {
        async fn fetch_orders(&self, _query: &OrderQuery) -> Result<Option<Value>, RepositoryError> {
            Err(RepositoryError::Unavailable("Connection failed".to_string()))
        }

        async fn fetch_order(&self, _id: &str) -> Result<Option<Value>, RepositoryError> {
            Err(RepositoryError::Unavailable("Connection failed".to_string()))
        }

        async fn insert_order(&self, _record: Value) -> Result<Option<Value>, RepositoryError> {
            Err(RepositoryError::Unavailable("Connection failed".to_string()))
        }

        async fn update_order(&self, _id: &str, _changes: Map<String, Value>) -> Result<Option<Value>, RepositoryError> {
            Err(RepositoryError::Unavailable("Connection failed".to_string()))
        }

        async fn delete_order(&self, _id: &str) -> Result<bool, RepositoryError> {
            Err(RepositoryError::Unavailable("Connection failed".to_string()))
        }
    }

    fn unavailable() -> OrdersService {
        OrdersService::new(Arc::new(UnavailableRepository), OrdersServiceConfig::default())
    }

    #[tokio::test]
    async fn test_get_orders_skips_invalid_rows() {
        let service = service_over(json!([
            row(ORDER_1, "pending", 100.0),
            { "id": "not-a-uuid", "status": "pending" },
            row(ORDER_2, "completed", 50.0)
        ]));

        let result = service.get_orders(OrderQuery::default()).await;

        let orders = result.data().unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, ORDER_1);
        assert_eq!(orders[1].id, ORDER_2);
        assert_eq!(result.meta().unwrap().skipped_count, 1);
        assert_eq!(result.message(), "Orders retrieved successfully");
    }

    #[tokio::test]
    async fn test_get_orders_filters() {
        let service = service_over(json!([row(ORDER_1, "pending", 100.0), row(ORDER_2, "completed", 50.0)]));

        let query = OrderQuery {
            customer_id: Some(CUSTOMER.to_string()),
            status: Some(OrderStatus::Completed),
        };
        let orders = service.get_orders(query).await.into_data().unwrap();

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, ORDER_2);
    }

    #[tokio::test]
    async fn test_get_orders_rejects_bad_customer_filter() {
        let query = OrderQuery {
            customer_id: Some("invalid-uuid".to_string()),
            status: None,
        };
        let result = service_over(json!([])).get_orders(query).await;

        assert_eq!(result.error_kind(), Some(ErrorKind::InvalidInput));
        assert_eq!(result.message(), "Invalid customer ID format");
    }

    #[tokio::test]
    async fn test_get_orders_absent_or_malformed_storage() {
        let absent = service_over(Value::Null).get_orders(OrderQuery::default()).await;
        assert_eq!(absent.data(), Some(&vec![]));
        assert_eq!(absent.meta().unwrap().warnings, vec![MISSING_COLLECTION_WARNING.to_string()]);
        assert_eq!(absent.message(), "No orders found");

        let malformed = service_over(json!("corrupted")).get_orders(OrderQuery::default()).await;
        assert!(malformed.is_success());
        assert_eq!(malformed.data(), Some(&vec![]));
    }

    #[tokio::test]
    async fn test_storage_errors_are_database_failures() {
        let sink = Arc::new(RecordingSink::default());
        let service = unavailable().with_sink(sink.clone());

        let result = service.get_orders(OrderQuery::default()).await;

        assert_eq!(result.error_kind(), Some(ErrorKind::Database));
        assert_eq!(result.message(), "Database error: Connection failed");
        assert_eq!(sink.count(Level::Error), 1);

        assert_eq!(service.get_order_stats().await.error_kind(), Some(ErrorKind::Database));
        assert_eq!(service.delete_order(ORDER_1).await.error_kind(), Some(ErrorKind::Database));
    }

    #[tokio::test]
    async fn test_get_order_by_id() {
        let service = service_over(json!([row(ORDER_1, "pending", 100.0), { "id": ORDER_2, "status": 7 }]));

        let found = service.get_order_by_id(ORDER_1).await;
        assert_eq!(found.data().unwrap().as_ref().unwrap().id, ORDER_1);

        let missing = service.get_order_by_id(MISSING).await;
        assert!(missing.is_success());
        assert_eq!(missing.data(), Some(&None));

        let malformed = service.get_order_by_id(ORDER_2).await;
        assert_eq!(malformed.data(), Some(&None));
        assert_eq!(malformed.meta().unwrap().skipped_count, 1);
        assert!(malformed.meta().unwrap().warnings[0].starts_with(&format!("Skipped invalid order {}", ORDER_2)));
    }

    #[tokio::test]
    async fn test_order_id_parameter_checks() {
        let service = service_over(json!([]));

        let empty = service.get_order_by_id("").await;
        assert_eq!(empty.error_kind(), Some(ErrorKind::InvalidInput));
        assert_eq!(empty.message(), "Order ID is required");

        let bad = service.delete_order("invalid-uuid").await;
        assert_eq!(bad.error_kind(), Some(ErrorKind::InvalidInput));
        assert_eq!(bad.message(), "Invalid order ID format");
    }

    #[tokio::test]
    async fn test_create_order() {
        let service = service_over(json!([]));

        let result = service.create_order(create(json!(150.0))).await;

        assert_eq!(result.message(), "Order created successfully");
        let order = result.into_data().unwrap();
        assert!(is_uuid(&order.id));
        assert_eq!(order.status, Some(OrderStatus::Pending));
        assert_eq!(order.total_amount, 150.0);
        assert!(order.created_at.is_some());

        let stored = service.get_order_by_id(&order.id).await.into_data().unwrap();
        assert_eq!(stored.map(|o| o.id), Some(order.id));
    }

    #[tokio::test]
    async fn test_create_order_rejects_bad_amounts() {
        let service = service_over(json!([]));

        for amount in [json!(-100.0), json!(0), json!(1_000_000.0), json!("lots")] {
            let result = service.create_order(create(amount)).await;
            assert_eq!(result.error_kind(), Some(ErrorKind::Validation));
            assert!(result.message().starts_with("Validation failed: "));
        }

        let orders = service.get_orders(OrderQuery::default()).await.into_data().unwrap();
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn test_create_order_rejects_broken_items() {
        let mut command = create(json!(10.0));
        command.items = vec![json!({ "id": "item-1", "product_id": "p-1", "quantity": "two", "price": 5.0 })];

        let result = service_over(json!([])).create_order(command).await;

        assert_eq!(result.error_kind(), Some(ErrorKind::Validation));
        assert!(result.message().contains("items[0].quantity"));
    }

    #[tokio::test]
    async fn test_create_order_without_validation() {
        let config = OrdersServiceConfig {
            validation_enabled: false,
            ..OrdersServiceConfig::default()
        };
        let service = OrdersService::new(Arc::new(InMemoryOrderRepository::new()), config);

        let result = service.create_order(create(json!(-5.0))).await;

        assert_eq!(result.into_data().unwrap().total_amount, -5.0);
    }

    #[tokio::test]
    async fn test_create_order_foreign_key_violation() {
        let mut command = create(json!(10.0));
        command.customer_id = MISSING.to_string();

        let result = service_over(json!([])).create_order(command).await;

        assert_eq!(result.error_kind(), Some(ErrorKind::Validation));
        assert_eq!(result.message(), "Referenced customer does not exist");
        match result {
            ResultEnvelope::Failure { details, .. } => assert_eq!(details["code"], FOREIGN_KEY_VIOLATION),
            ResultEnvelope::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_update_order() {
        let service = service_over(json!([row(ORDER_1, "pending", 100.0)]));

        let command = UpdateOrder {
            status: Some("completed".to_string()),
            ..UpdateOrder::default()
        };
        let result = service.update_order(ORDER_1, command).await;

        assert_eq!(result.message(), "Order updated successfully");
        let order = result.into_data().unwrap();
        assert_eq!(order.status, Some(OrderStatus::Completed));
        assert_eq!(order.total_amount, 100.0);
    }

    #[tokio::test]
    async fn test_update_order_failures() {
        let service = service_over(json!([row(ORDER_1, "pending", 100.0)]));

        let empty = service.update_order(ORDER_1, UpdateOrder::default()).await;
        assert_eq!(empty.error_kind(), Some(ErrorKind::InvalidInput));

        let bad_status = UpdateOrder {
            status: Some("shipped".to_string()),
            ..UpdateOrder::default()
        };
        let invalid = service.update_order(ORDER_1, bad_status).await;
        assert_eq!(invalid.error_kind(), Some(ErrorKind::Validation));

        let command = UpdateOrder {
            total_amount: Some(json!(20.0)),
            ..UpdateOrder::default()
        };
        let missing = service.update_order(MISSING, command).await;
        assert_eq!(missing.error_kind(), Some(ErrorKind::NotFound));
        assert_eq!(missing.message(), "Order not found");
    }

    #[tokio::test]
    async fn test_delete_order() {
        let service = service_over(json!([row(ORDER_1, "pending", 100.0)]));

        let deleted = service.delete_order(ORDER_1).await;
        assert_eq!(deleted.data(), Some(&true));
        assert_eq!(deleted.message(), "Order deleted successfully");

        let again = service.delete_order(ORDER_1).await;
        assert_eq!(again.error_kind(), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_get_order_stats() {
        let service = service_over(json!([
            row(ORDER_1, "pending", 150.0),
            row(ORDER_2, "completed", 50.0),
            { "id": MISSING },
            "not-a-row"
        ]));

        let result = service.get_order_stats().await;

        let stats = result.data().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.total_amount, 200.0);
        assert!((stats.average_amount - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.by_status.get("pending"), Some(&1));
        assert_eq!(stats.by_status.get("completed"), Some(&1));
        assert_eq!(stats.by_status.get("unknown"), Some(&1));
        assert_eq!(result.meta().unwrap().skipped_count, 1);
    }

    #[tokio::test]
    async fn test_get_order_stats_counts_status_only_rows() {
        let service = service_over(json!([
            { "status": "pending" },
            { "status": "completed" },
            { "status": "pending" },
            { "status": "in_progress" }
        ]));

        let result = service.get_order_stats().await;

        assert!(result.is_success());
        let stats = result.data().unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_status.get("pending"), Some(&2));
        assert_eq!(stats.by_status.get("completed"), Some(&1));
        assert_eq!(stats.by_status.get("in_progress"), Some(&1));
        assert_eq!(stats.total_amount, 0.0);
        assert_eq!(result.meta().unwrap().skipped_count, 0);
    }

    #[tokio::test]
    async fn test_failures_are_counted_in_metrics() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let service = unavailable().with_metrics(metrics.clone());

        service.get_orders(OrderQuery::default()).await;

        let text = String::from_utf8(metrics.render().unwrap()).unwrap();
        let line = text
            .lines()
            .find(|line| line.starts_with("operation_failures_total{"))
            .unwrap();
        assert!(line.contains("kind=\"database\""));
        assert!(line.contains("operation=\"get_orders\""));
        assert!(line.ends_with(" 1"));
    }
}
