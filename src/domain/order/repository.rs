use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tokio::sync::RwLock;

use crate::utils::{retry_on_transient, IsTransient, RetryConfig};
use super::errors::{RepositoryError, FOREIGN_KEY_VIOLATION, UNIQUE_VIOLATION};
use super::value_objects::OrderStatus;

// ============================================================================
// Order Repository - Storage collaborator
// ============================================================================
//
// Storage hands back raw JSON on purpose: rows are untrusted until the
// validator narrows them, exactly like caller-supplied collections.
//
// `Ok(None)` from a read means "no data at all" (absent table or row), which
// services treat as an empty result rather than an error.
//
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderQuery {
    pub customer_id: Option<String>,
    pub status: Option<OrderStatus>,
}

impl OrderQuery {
    fn matches(&self, record: &Value) -> bool {
        if let Some(customer_id) = &self.customer_id {
            if record.get("customer_id").and_then(Value::as_str) != Some(customer_id.as_str()) {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if record.get("status").and_then(Value::as_str) != Some(status.as_str()) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Raw order collection, filtered by `query` where the rows allow it
    async fn fetch_orders(&self, query: &OrderQuery) -> Result<Option<Value>, RepositoryError>;

    async fn fetch_order(&self, id: &str) -> Result<Option<Value>, RepositoryError>;

    /// Returns the stored row
    async fn insert_order(&self, record: Value) -> Result<Option<Value>, RepositoryError>;

    /// Merge `changes` into the row; `Ok(None)` when no row has that id
    async fn update_order(&self, id: &str, changes: Map<String, Value>) -> Result<Option<Value>, RepositoryError>;

    /// `Ok(false)` when no row has that id
    async fn delete_order(&self, id: &str) -> Result<bool, RepositoryError>;
}

impl IsTransient for RepositoryError {
    fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Unavailable(_))
    }
}

// ============================================================================
// In-memory table
// ============================================================================

/// Order table held as a single raw JSON value.
///
/// The table may be `null` or not an array at all, which is how tests and
/// fixtures simulate broken storage.
pub struct InMemoryOrderRepository {
    table: RwLock<Value>,
    known_customers: Option<HashSet<String>>,
}

impl Default for InMemoryOrderRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::with_table(Value::Array(Vec::new()))
    }

    pub fn with_table(table: Value) -> Self {
        Self {
            table: RwLock::new(table),
            known_customers: None,
        }
    }

    /// Enforce the customer foreign key on writes
    pub fn with_known_customers<I, S>(mut self, customers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_customers = Some(customers.into_iter().map(Into::into).collect());
        self
    }

    fn check_customer(&self, record: &Map<String, Value>) -> Result<(), RepositoryError> {
        let Some(known) = &self.known_customers else {
            return Ok(());
        };
        let customer_id = record.get("customer_id").and_then(Value::as_str).unwrap_or_default();
        if known.contains(customer_id) {
            Ok(())
        } else {
            Err(RepositoryError::Constraint {
                code: FOREIGN_KEY_VIOLATION.to_string(),
                message: format!("customer {} is not present", customer_id),
            })
        }
    }
}

fn rows_mut(table: &mut Value) -> Result<&mut Vec<Value>, RepositoryError> {
    if table.is_null() {
        *table = Value::Array(Vec::new());
    }
    table
        .as_array_mut()
        .ok_or_else(|| RepositoryError::Other("order table is not an array".to_string()))
}

fn has_id(record: &Value, id: &str) -> bool {
    record.get("id").and_then(Value::as_str) == Some(id)
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn fetch_orders(&self, query: &OrderQuery) -> Result<Option<Value>, RepositoryError> {
        let table = self.table.read().await;
        match &*table {
            Value::Null => Ok(None),
            Value::Array(rows) => Ok(Some(Value::Array(
                rows.iter().filter(|row| query.matches(row)).cloned().collect(),
            ))),
            other => Ok(Some(other.clone())),
        }
    }

    async fn fetch_order(&self, id: &str) -> Result<Option<Value>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table
            .as_array()
            .and_then(|rows| rows.iter().find(|row| has_id(row, id)))
            .cloned())
    }

    async fn insert_order(&self, record: Value) -> Result<Option<Value>, RepositoryError> {
        let fields = record
            .as_object()
            .ok_or_else(|| RepositoryError::Unexpected("order record is not an object".to_string()))?;
        self.check_customer(fields)?;

        let mut table = self.table.write().await;
        let rows = rows_mut(&mut table)?;

        if let Some(id) = fields.get("id").and_then(Value::as_str) {
            if rows.iter().any(|row| has_id(row, id)) {
                return Err(RepositoryError::Constraint {
                    code: UNIQUE_VIOLATION.to_string(),
                    message: format!("order {} already exists", id),
                });
            }
        }

        rows.push(record.clone());
        Ok(Some(record))
    }

    async fn update_order(&self, id: &str, changes: Map<String, Value>) -> Result<Option<Value>, RepositoryError> {
        if changes.contains_key("customer_id") {
            self.check_customer(&changes)?;
        }

        let mut table = self.table.write().await;
        let rows = rows_mut(&mut table)?;

        let Some(row) = rows.iter_mut().find(|row| has_id(row, id)) else {
            return Ok(None);
        };
        let Some(fields) = row.as_object_mut() else {
            return Err(RepositoryError::Other(format!("stored order {} is not an object", id)));
        };

        for (key, value) in changes {
            fields.insert(key, value);
        }
        Ok(Some(row.clone()))
    }

    async fn delete_order(&self, id: &str) -> Result<bool, RepositoryError> {
        let mut table = self.table.write().await;
        let rows = rows_mut(&mut table)?;

        let before = rows.len();
        rows.retain(|row| !has_id(row, id));
        Ok(rows.len() != before)
    }
}

// ============================================================================
// Retrying wrapper
// ============================================================================

/// Retries reads that fail with a transient error. Writes pass straight
/// through so a half-applied write is never replayed.
pub struct RetryingRepository<R> {
    inner: R,
    config: RetryConfig,
}

impl<R: OrderRepository> RetryingRepository<R> {
    pub fn new(inner: R, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: OrderRepository> OrderRepository for RetryingRepository<R> {
    async fn fetch_orders(&self, query: &OrderQuery) -> Result<Option<Value>, RepositoryError> {
        retry_on_transient(self.config.clone(), |_attempt| self.inner.fetch_orders(query))
            .await
            .into_result()
    }

    async fn fetch_order(&self, id: &str) -> Result<Option<Value>, RepositoryError> {
        retry_on_transient(self.config.clone(), |_attempt| self.inner.fetch_order(id))
            .await
            .into_result()
    }

    async fn insert_order(&self, record: Value) -> Result<Option<Value>, RepositoryError> {
        self.inner.insert_order(record).await
    }

    async fn update_order(&self, id: &str, changes: Map<String, Value>) -> Result<Option<Value>, RepositoryError> {
        self.inner.update_order(id, changes).await
    }

    async fn delete_order(&self, id: &str) -> Result<bool, RepositoryError> {
        self.inner.delete_order(id).await
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
