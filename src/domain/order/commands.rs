use serde::Deserialize;
use serde_json::{Map, Value};

// ============================================================================
// Order Commands - Represent caller intent on the order store
// ============================================================================
//
// Commands stay loosely typed: amounts and statuses are validated by the
// schema validator after the record is assembled, so a bad value produces a
// `Validation` failure with the full list of findings instead of a parse
// error on the first one.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateOrder {
    pub customer_id: String,
    pub total_amount: Value,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub items: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UpdateOrder {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub total_amount: Option<Value>,
    #[serde(default)]
    pub status: Option<String>,
}

impl UpdateOrder {
    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none() && self.total_amount.is_none() && self.status.is_none()
    }

    /// The fields present, keyed by column
    pub fn into_changes(self) -> Map<String, Value> {
        let mut changes = Map::new();
        if let Some(customer_id) = self.customer_id {
            changes.insert("customer_id".to_string(), Value::String(customer_id));
        }
        if let Some(total_amount) = self.total_amount {
            changes.insert("total_amount".to_string(), total_amount);
        }
        if let Some(status) = self.status {
            changes.insert("status".to_string(), Value::String(status));
        }
        changes
    }
}
