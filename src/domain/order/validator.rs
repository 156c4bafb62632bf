use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

use super::errors::{ValidationError, ValidationOutcome};
use super::value_objects::{ItemRecord, Order, OrderItem, OrderStatus, RejectedItem};

// ============================================================================
// Schema Validator
// ============================================================================
//
// The single narrowing point from raw key/value records to typed orders.
//
// - Every field rule runs independently; one defect never hides another
// - Nothing here panics: unexpected shapes become blocking findings
// - Item-level structural defects are NOT filed against the order; the item
//   is carried as `ItemRecord::Rejected` and excluded during aggregation
//
// ============================================================================

pub const DEFAULT_MAX_TOTAL_AMOUNT: f64 = 999_999.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdFormat {
    /// Any non-blank string
    NonEmpty,
    /// Must match the RFC 4122 shape (versions 1-5)
    Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    pub id_format: IdFormat,
    pub max_total_amount: f64,
    /// Absent `items` blocks the order when set
    pub require_items: bool,
    /// Negative, zero, and over-maximum totals block instead of advising
    pub strict_amounts: bool,
    /// Fallbacks used when records are narrowed without validation
    pub lenient: LenientDefaults,
}

/// Values substituted for missing or unusable fields when validation is off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LenientDefaults {
    pub quantity: f64,
    pub price: f64,
    /// `None` leaves the order in the `unknown` status bucket
    pub status: Option<OrderStatus>,
}

impl Default for LenientDefaults {
    fn default() -> Self {
        Self {
            quantity: 0.0,
            price: 0.0,
            status: None,
        }
    }
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self::analytics()
    }
}

impl ValidationRules {
    /// Rules for analysing order collections handed in by callers
    pub fn analytics() -> Self {
        Self {
            id_format: IdFormat::NonEmpty,
            max_total_amount: DEFAULT_MAX_TOTAL_AMOUNT,
            require_items: true,
            strict_amounts: false,
            lenient: LenientDefaults::default(),
        }
    }

    /// Rules for rows read back from the order store
    pub fn persistence() -> Self {
        Self {
            id_format: IdFormat::Uuid,
            max_total_amount: DEFAULT_MAX_TOTAL_AMOUNT,
            require_items: false,
            strict_amounts: false,
            lenient: LenientDefaults::default(),
        }
    }

    /// Same rules, with amount checks promoted to blocking (write paths)
    pub fn strict(self) -> Self {
        Self {
            strict_amounts: true,
            ..self
        }
    }
}

fn uuid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
            .expect("uuid pattern compiles")
    })
}

pub fn is_uuid(value: &str) -> bool {
    uuid_pattern().is_match(value)
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

struct IdField {
    key: &'static str,
    name: &'static str,
    noun: &'static str,
}

const ORDER_ID: IdField = IdField { key: "id", name: "Order ID", noun: "order ID" };
const CUSTOMER_ID: IdField = IdField { key: "customer_id", name: "Customer ID", noun: "customer ID" };

#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    rules: ValidationRules,
}

impl SchemaValidator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Validate one raw order record.
    ///
    /// A record that is not a key/value object yields exactly one blocking
    /// finding and no field checks.
    pub fn validate(&self, record: &Value) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();

        let Some(obj) = record.as_object() else {
            outcome.block(
                ValidationError::new("$record", "Missing or malformed record")
                    .with_value(Some(record)),
            );
            return outcome;
        };

        self.check_identifier(obj, &ORDER_ID, &mut outcome);
        self.check_identifier(obj, &CUSTOMER_ID, &mut outcome);
        self.check_total_amount(obj.get("total_amount"), &mut outcome);
        check_status(obj.get("status"), &mut outcome);
        self.check_items(obj.get("items"), &mut outcome);
        check_timestamp(obj, "created_at", &mut outcome);
        check_timestamp(obj, "updated_at", &mut outcome);

        let order_id = declared_id(record);
        ValidationOutcome {
            blocking: outcome.blocking.into_iter().map(|e| e.for_order(order_id)).collect(),
            advisory: outcome.advisory.into_iter().map(|e| e.for_order(order_id)).collect(),
        }
    }

    /// Validate one nested item; `path` prefixes every field name
    pub fn validate_item(&self, item: &Value, path: &str) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();

        let Some(obj) = item.as_object() else {
            outcome.block(ValidationError::new(path, "Missing or malformed item").with_value(Some(item)));
            return outcome;
        };

        check_item_string(obj, "id", "Item ID", path, &mut outcome);
        check_item_string(obj, "product_id", "Product ID", path, &mut outcome);

        let quantity_path = format!("{}.quantity", path);
        match obj.get("quantity") {
            None | Some(Value::Null) => {
                outcome.block(ValidationError::new(quantity_path, "Item quantity is required"));
            }
            Some(value) => match value.as_f64() {
                Some(quantity) if quantity <= 0.0 => outcome.advise(
                    ValidationError::new(quantity_path, "Item quantity is zero or negative")
                        .with_value(Some(value)),
                ),
                Some(_) => {}
                None => outcome.block(
                    ValidationError::new(quantity_path, "Item quantity must be a number")
                        .with_value(Some(value)),
                ),
            },
        }

        let price_path = format!("{}.price", path);
        match obj.get("price") {
            None | Some(Value::Null) => {
                outcome.block(ValidationError::new(price_path, "Item price is required"));
            }
            Some(value) => match value.as_f64() {
                Some(price) if price < 0.0 => outcome.advise(
                    ValidationError::new(price_path, "Item price is negative").with_value(Some(value)),
                ),
                Some(_) => {}
                None => outcome.block(
                    ValidationError::new(price_path, "Item price must be a number")
                        .with_value(Some(value)),
                ),
            },
        }

        outcome
    }

    /// Validate a partial update; only the fields present are checked.
    /// Items are not updatable, so an `items` key is ignored.
    pub fn validate_changes(&self, changes: &Map<String, Value>) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();

        if changes.contains_key(CUSTOMER_ID.key) {
            self.check_identifier(changes, &CUSTOMER_ID, &mut outcome);
        }
        if let Some(amount) = changes.get("total_amount") {
            self.check_total_amount(Some(amount), &mut outcome);
        }
        if let Some(status) = changes.get("status") {
            check_status(Some(status), &mut outcome);
        }
        outcome
    }

    /// Validate and narrow. Returns the typed order with its advisory
    /// findings, or the full outcome when anything blocks.
    pub fn narrow(&self, record: &Value) -> Result<(Order, Vec<ValidationError>), ValidationOutcome> {
        let outcome = self.validate(record);
        if !outcome.is_valid() {
            return Err(outcome);
        }

        match record.as_object() {
            Some(obj) => Ok((self.build_order(obj), outcome.advisory)),
            None => Err(outcome),
        }
    }

    /// Narrow without field rules. Only non-object records are refused;
    /// unusable fields fall back to the configured lenient defaults.
    pub fn narrow_unchecked(&self, record: &Value) -> Option<Order> {
        let obj = record.as_object()?;
        let defaults = &self.rules.lenient;
        let items = collect_items(obj, |index, item| lenient_item(defaults, index, item));

        Some(Order {
            status: parse_status(obj).or(defaults.status),
            items,
            ..base_order(obj)
        })
    }

    fn build_order(&self, obj: &Map<String, Value>) -> Order {
        Order {
            status: parse_status(obj),
            items: collect_items(obj, |index, item| self.build_item(index, item)),
            ..base_order(obj)
        }
    }

    /// Narrow one item; structural failures become `ItemRecord::Rejected`
    pub fn build_item(&self, index: usize, item: &Value) -> ItemRecord {
        let outcome = self.validate_item(item, &format!("items[{}]", index));

        match item.as_object() {
            Some(obj) if outcome.is_valid() => ItemRecord::Valid(OrderItem {
                id: string_field(obj, "id"),
                product_id: string_field(obj, "product_id"),
                quantity: obj.get("quantity").and_then(Value::as_f64).unwrap_or(0.0),
                price: obj.get("price").and_then(Value::as_f64).unwrap_or(0.0),
            }),
            _ => ItemRecord::Rejected(RejectedItem {
                index,
                id: declared_id(item).map(str::to_string),
                errors: outcome.blocking,
            }),
        }
    }

    fn check_identifier(&self, obj: &Map<String, Value>, field: &IdField, outcome: &mut ValidationOutcome) {
        match obj.get(field.key) {
            None | Some(Value::Null) => {
                outcome.block(ValidationError::new(field.key, format!("{} is required", field.name)));
            }
            Some(Value::String(value)) if value.trim().is_empty() => {
                outcome.block(
                    ValidationError::new(field.key, format!("{} must not be empty", field.name))
                        .with_value(obj.get(field.key)),
                );
            }
            Some(Value::String(value)) => {
                if self.rules.id_format == IdFormat::Uuid && !is_uuid(value) {
                    outcome.block(
                        ValidationError::new(field.key, format!("Invalid {} format", field.noun))
                            .with_value(obj.get(field.key)),
                    );
                }
            }
            Some(other) => {
                outcome.block(
                    ValidationError::new(
                        field.key,
                        format!("{} must be a string, got {}", field.name, json_type_name(other)),
                    )
                    .with_value(Some(other)),
                );
            }
        }
    }

    fn check_total_amount(&self, value: Option<&Value>, outcome: &mut ValidationOutcome) {
        let value = match value {
            None | Some(Value::Null) => {
                outcome.block(ValidationError::new("total_amount", "Total amount is required"));
                return;
            }
            Some(value) => value,
        };

        let Some(amount) = value.as_f64() else {
            outcome.block(
                ValidationError::new("total_amount", "Total amount must be a number").with_value(Some(value)),
            );
            return;
        };

        if !amount.is_finite() {
            outcome.block(
                ValidationError::new("total_amount", "Total amount must be finite").with_value(Some(value)),
            );
            return;
        }

        let mut findings = Vec::new();
        if amount < 0.0 {
            findings.push(ValidationError::new("total_amount", "Total amount is negative"));
        } else if amount == 0.0 && self.rules.strict_amounts {
            findings.push(ValidationError::new("total_amount", "Total amount must be greater than zero"));
        }
        if amount > self.rules.max_total_amount {
            findings.push(ValidationError::new(
                "total_amount",
                format!("Total amount exceeds maximum of {}", self.rules.max_total_amount),
            ));
        }

        for finding in findings {
            let finding = finding.with_value(Some(value));
            if self.rules.strict_amounts {
                outcome.block(finding);
            } else {
                outcome.advise(finding);
            }
        }
    }

    fn check_items(&self, value: Option<&Value>, outcome: &mut ValidationOutcome) {
        match value {
            None | Some(Value::Null) => {
                if self.rules.require_items {
                    outcome.block(ValidationError::new("items", "Items collection is missing"));
                }
            }
            Some(Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    let item_outcome = self.validate_item(item, &format!("items[{}]", index));
                    // structurally broken items are reported by aggregation instead
                    if item_outcome.is_valid() {
                        outcome.advisory.extend(item_outcome.advisory);
                    }
                }
            }
            Some(other) => {
                outcome.block(
                    ValidationError::new(
                        "items",
                        format!("Items must be an array, got {}", json_type_name(other)),
                    )
                    .with_value(Some(other)),
                );
            }
        }
    }
}

fn check_status(value: Option<&Value>, outcome: &mut ValidationOutcome) {
    match value {
        None | Some(Value::Null) => {
            outcome.block(ValidationError::new("status", "Status is required"));
        }
        Some(Value::String(status)) => {
            if OrderStatus::parse(status).is_none() {
                outcome.block(
                    ValidationError::new("status", format!("Invalid status '{}'", status))
                        .with_value(value),
                );
            }
        }
        Some(other) => {
            outcome.block(
                ValidationError::new(
                    "status",
                    format!("Status must be a string, got {}", json_type_name(other)),
                )
                .with_value(Some(other)),
            );
        }
    }
}

fn check_item_string(
    obj: &Map<String, Value>,
    key: &str,
    name: &str,
    path: &str,
    outcome: &mut ValidationOutcome,
) {
    let field = format!("{}.{}", path, key);
    match obj.get(key) {
        Some(Value::String(value)) if !value.trim().is_empty() => {}
        Some(Value::String(_)) => {
            outcome.block(ValidationError::new(field, format!("{} must not be empty", name)));
        }
        None | Some(Value::Null) => {
            outcome.block(ValidationError::new(field, format!("{} is required", name)));
        }
        Some(other) => {
            outcome.block(
                ValidationError::new(field, format!("{} must be a string", name)).with_value(Some(other)),
            );
        }
    }
}

// Timestamps are optional; only a present-but-unusable value is noted.
fn check_timestamp(obj: &Map<String, Value>, key: &str, outcome: &mut ValidationOutcome) {
    match obj.get(key) {
        None | Some(Value::Null) => {}
        Some(value @ Value::String(_)) => {
            if parse_timestamp(Some(value)).is_none() {
                outcome.advise(
                    ValidationError::new(key, "Timestamp is not valid RFC 3339").with_value(Some(value)),
                );
            }
        }
        Some(other) => {
            outcome.advise(
                ValidationError::new(key, "Timestamp must be a string").with_value(Some(other)),
            );
        }
    }
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

fn parse_status(obj: &Map<String, Value>) -> Option<OrderStatus> {
    obj.get("status").and_then(Value::as_str).and_then(OrderStatus::parse)
}

/// Order with every scalar field narrowed and no items or status yet
fn base_order(obj: &Map<String, Value>) -> Order {
    Order {
        id: string_field(obj, "id"),
        customer_id: string_field(obj, "customer_id"),
        total_amount: obj.get("total_amount").and_then(Value::as_f64).unwrap_or(0.0),
        status: None,
        items: Vec::new(),
        created_at: parse_timestamp(obj.get("created_at")),
        updated_at: parse_timestamp(obj.get("updated_at")),
    }
}

fn collect_items<F>(obj: &Map<String, Value>, build: F) -> Vec<ItemRecord>
where
    F: Fn(usize, &Value) -> ItemRecord,
{
    obj.get("items")
        .and_then(Value::as_array)
        .map(|items| items.iter().enumerate().map(|(index, item)| build(index, item)).collect())
        .unwrap_or_default()
}

fn lenient_item(defaults: &LenientDefaults, index: usize, item: &Value) -> ItemRecord {
    match item.as_object() {
        Some(obj) => ItemRecord::Valid(OrderItem {
            id: string_field(obj, "id"),
            product_id: string_field(obj, "product_id"),
            quantity: obj.get("quantity").and_then(Value::as_f64).unwrap_or(defaults.quantity),
            price: obj.get("price").and_then(Value::as_f64).unwrap_or(defaults.price),
        }),
        None => ItemRecord::Rejected(RejectedItem {
            index,
            id: None,
            errors: vec![ValidationError::new(format!("items[{}]", index), "Missing or malformed item")
                .with_value(Some(item))],
        }),
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

/// The record's `id` when it is a non-empty string
pub fn declared_id(record: &Value) -> Option<&str> {
    record
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_order() -> Value {
        json!({
            "id": "order-1",
            "customer_id": "customer-1",
            "total_amount": 150.0,
            "status": "pending",
            "items": [
                { "id": "item-1", "product_id": "product-1", "quantity": 2, "price": 50.0 },
                { "id": "item-2", "product_id": "product-2", "quantity": 1, "price": 50.0 }
            ],
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    fn fields_of(errors: &[ValidationError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn test_valid_order_has_no_findings() {
        let outcome = SchemaValidator::default().validate(&valid_order());
        assert!(outcome.is_valid());
        assert!(outcome.advisory.is_empty());
    }

    #[test]
    fn test_non_object_record_yields_single_blocking_error() {
        let validator = SchemaValidator::default();
        for record in [Value::Null, json!("order"), json!(42), json!([1, 2])] {
            let outcome = validator.validate(&record);
            assert_eq!(outcome.blocking.len(), 1);
            assert_eq!(outcome.blocking[0].field, "$record");
            assert_eq!(outcome.blocking[0].message, "Missing or malformed record");
            assert!(outcome.advisory.is_empty());
        }
    }

    #[test]
    fn test_all_field_rules_run_without_short_circuit() {
        let record = json!({
            "id": null,
            "total_amount": "not-a-number",
            "status": 123,
            "items": "not-an-array",
            "created_at": "invalid-date",
            "updated_at": "invalid-date"
        });

        let outcome = SchemaValidator::default().validate(&record);

        assert_eq!(
            fields_of(&outcome.blocking),
            vec!["id", "customer_id", "total_amount", "status", "items"]
        );
        assert_eq!(fields_of(&outcome.advisory), vec!["created_at", "updated_at"]);
    }

    #[test]
    fn test_missing_items_blocks_only_when_required() {
        let mut record = valid_order();
        record.as_object_mut().unwrap().remove("items");

        let analytics = SchemaValidator::new(ValidationRules::analytics()).validate(&record);
        assert_eq!(fields_of(&analytics.blocking), vec!["items"]);

        let lenient = ValidationRules { require_items: false, ..ValidationRules::analytics() };
        assert!(SchemaValidator::new(lenient).validate(&record).is_valid());
    }

    #[test]
    fn test_unknown_status_blocks() {
        let mut record = valid_order();
        record["status"] = json!("shipped");

        let outcome = SchemaValidator::default().validate(&record);
        assert_eq!(outcome.blocking.len(), 1);
        assert_eq!(outcome.blocking[0].message, "Invalid status 'shipped'");
        assert_eq!(outcome.blocking[0].order_id.as_deref(), Some("order-1"));
    }

    #[test]
    fn test_negative_total_is_advisory_unless_strict() {
        let mut record = valid_order();
        record["total_amount"] = json!(-10.0);

        let lenient = SchemaValidator::default().validate(&record);
        assert!(lenient.is_valid());
        assert_eq!(lenient.advisory[0].message, "Total amount is negative");

        let strict = SchemaValidator::new(ValidationRules::analytics().strict()).validate(&record);
        assert!(!strict.is_valid());
        assert_eq!(strict.blocking[0].message, "Total amount is negative");
    }

    #[test]
    fn test_total_above_maximum() {
        let mut record = valid_order();
        record["total_amount"] = json!(1_000_000.0);

        let lenient = SchemaValidator::default().validate(&record);
        assert!(lenient.is_valid());
        assert_eq!(lenient.advisory.len(), 1);

        let strict = SchemaValidator::new(ValidationRules::analytics().strict()).validate(&record);
        assert_eq!(strict.blocking.len(), 1);

        record["total_amount"] = json!(DEFAULT_MAX_TOTAL_AMOUNT);
        assert!(SchemaValidator::new(ValidationRules::analytics().strict()).validate(&record).advisory.is_empty());
    }

    #[test]
    fn test_uuid_format_rule() {
        let validator = SchemaValidator::new(ValidationRules::persistence());
        let outcome = validator.validate(&valid_order());

        assert_eq!(fields_of(&outcome.blocking), vec!["id", "customer_id"]);
        assert_eq!(outcome.blocking[0].message, "Invalid order ID format");
        assert_eq!(outcome.blocking[1].message, "Invalid customer ID format");

        let mut record = valid_order();
        record["id"] = json!("550e8400-e29b-41d4-a716-446655440001");
        record["customer_id"] = json!("550E8400-E29B-41D4-A716-446655440002");
        assert!(validator.validate(&record).is_valid());
    }

    #[test]
    fn test_is_uuid() {
        assert!(is_uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_uuid("550e8400-e29b-61d4-a716-446655440000")); // version 6
        assert!(!is_uuid("550e8400-e29b-41d4-c716-446655440000")); // variant
        assert!(!is_uuid("invalid-uuid"));
        assert!(!is_uuid(""));
    }

    #[test]
    fn test_item_value_rules_are_advisory() {
        let validator = SchemaValidator::default();
        let outcome = validator.validate_item(
            &json!({ "id": "item-1", "product_id": "p", "quantity": 0, "price": -5 }),
            "items[0]",
        );

        assert!(outcome.is_valid());
        assert_eq!(fields_of(&outcome.advisory), vec!["items[0].quantity", "items[0].price"]);
    }

    #[test]
    fn test_item_structural_rules_block() {
        let validator = SchemaValidator::default();
        let outcome = validator.validate_item(
            &json!({ "id": 7, "quantity": "invalid", "price": 50 }),
            "items[2]",
        );

        assert_eq!(
            fields_of(&outcome.blocking),
            vec!["items[2].id", "items[2].product_id", "items[2].quantity"]
        );

        let not_object = validator.validate_item(&json!("item"), "items[0]");
        assert_eq!(fields_of(&not_object.blocking), vec!["items[0]"]);
    }

    #[test]
    fn test_order_collects_item_advisories_but_not_item_structure() {
        let mut record = valid_order();
        record["items"] = json!([
            { "id": "item-1", "product_id": "product-1", "quantity": 1, "price": -50.0 },
            { "id": "item-2", "product_id": "product-2", "quantity": "invalid", "price": -1 }
        ]);

        let outcome = SchemaValidator::default().validate(&record);

        assert!(outcome.is_valid());
        assert_eq!(outcome.advisory.len(), 1);
        assert_eq!(outcome.advisory[0].field, "items[0].price");
        assert_eq!(outcome.advisory[0].order_id.as_deref(), Some("order-1"));
    }

    #[test]
    fn test_narrow_builds_typed_order() {
        let mut record = valid_order();
        record["items"][1]["quantity"] = json!("invalid");

        let (order, advisory) = SchemaValidator::default().narrow(&record).unwrap();

        assert!(advisory.is_empty());
        assert_eq!(order.id, "order-1");
        assert_eq!(order.status, Some(OrderStatus::Pending));
        assert_eq!(order.valid_items().count(), 1);
        let rejected: Vec<_> = order.rejected_items().collect();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].index, 1);
        assert_eq!(rejected[0].id.as_deref(), Some("item-2"));
        assert!(order.created_at.is_some());
    }

    #[test]
    fn test_narrow_rejects_blocking_records() {
        let outcome = SchemaValidator::default()
            .narrow(&json!({ "id": "order-1" }))
            .unwrap_err();
        assert!(!outcome.is_valid());
    }

    #[test]
    fn test_narrow_unchecked_defaults_missing_fields() {
        let validator = SchemaValidator::default();
        let order = validator
            .narrow_unchecked(&json!({ "id": "order-1", "status": "pending", "items": null }))
            .unwrap();

        assert_eq!(order.customer_id, "");
        assert_eq!(order.total_amount, 0.0);
        assert!(order.items.is_empty());
        assert!(validator.narrow_unchecked(&json!(["order"])).is_none());
    }

    #[test]
    fn test_validate_changes_checks_present_fields_only() {
        let validator = SchemaValidator::new(ValidationRules::persistence().strict());

        let mut changes = Map::new();
        changes.insert("status".to_string(), json!("completed"));
        assert!(validator.validate_changes(&changes).is_valid());

        changes.insert("total_amount".to_string(), json!(-1));
        changes.insert("customer_id".to_string(), json!("invalid-uuid"));
        let outcome = validator.validate_changes(&changes);
        assert_eq!(fields_of(&outcome.blocking), vec!["customer_id", "total_amount"]);
    }

    #[test]
    fn test_validate_changes_ignores_items() {
        let validator = SchemaValidator::new(ValidationRules::persistence().strict());

        let mut changes = Map::new();
        changes.insert("items".to_string(), json!("not-a-list"));
        let outcome = validator.validate_changes(&changes);

        assert!(outcome.is_valid());
        assert!(outcome.advisory.is_empty());
    }

    #[test]
    fn test_narrow_unchecked_applies_lenient_defaults() {
        let rules = ValidationRules {
            lenient: LenientDefaults {
                quantity: 1.0,
                price: 10.0,
                status: Some(OrderStatus::Pending),
            },
            ..ValidationRules::analytics()
        };
        let validator = SchemaValidator::new(rules);

        let order = validator
            .narrow_unchecked(&json!({
                "id": "order-1",
                "status": "shipped",
                "items": [{ "id": "a" }, { "id": "b", "quantity": 3, "price": "free" }, 7]
            }))
            .unwrap();

        assert_eq!(order.status, Some(OrderStatus::Pending));
        match (&order.items[0], &order.items[1]) {
            (ItemRecord::Valid(first), ItemRecord::Valid(second)) => {
                assert_eq!((first.quantity, first.price), (1.0, 10.0));
                assert_eq!((second.quantity, second.price), (3.0, 10.0));
                assert_eq!(second.product_id, "");
            }
            other => panic!("expected valid items, got {:?}", other),
        }
        match &order.items[2] {
            ItemRecord::Rejected(rejected) => assert_eq!(rejected.index, 2),
            other => panic!("expected rejected item, got {:?}", other),
        }
    }

    #[test]
    fn test_narrow_keeps_validated_items_despite_defaults() {
        let rules = ValidationRules {
            lenient: LenientDefaults {
                quantity: 1.0,
                price: 10.0,
                status: Some(OrderStatus::Pending),
            },
            ..ValidationRules::analytics()
        };
        let (order, _) = SchemaValidator::new(rules)
            .narrow(&json!({
                "id": "order-1",
                "customer_id": "c-1",
                "status": "completed",
                "items": [{ "id": "a" }]
            }))
            .unwrap();

        assert_eq!(order.status, Some(OrderStatus::Completed));
        assert!(matches!(order.items[0], ItemRecord::Rejected(_)));
    }
}
