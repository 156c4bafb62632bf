use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::ValidationError;

// ============================================================================
// Order Value Objects
// ============================================================================
//
// Strongly-typed shapes produced by the schema validator. Nothing outside the
// validator builds these from raw input.
//
// ============================================================================

/// Bucket used when an order's status could not be determined.
pub const UNKNOWN_STATUS: &str = "unknown";

/// Closed set of order lifecycle values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Parse the wire form; anything outside the closed set yields `None`
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub product_id: String,
    pub quantity: f64,
    pub price: f64,
}

impl OrderItem {
    /// quantity × price, no clamping of zero or negative values
    pub fn subtotal(&self) -> f64 {
        self.quantity * self.price
    }
}

/// An item that failed structural checks; kept so aggregation can report it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedItem {
    pub index: usize,
    pub id: Option<String>,
    pub errors: Vec<ValidationError>,
}

impl RejectedItem {
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("at index {}", self.index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemRecord {
    Valid(OrderItem),
    Rejected(RejectedItem),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    /// Informational only; revenue is always recomputed from items
    pub total_amount: f64,
    /// `None` only when validation was bypassed
    pub status: Option<OrderStatus>,
    pub items: Vec<ItemRecord>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn status_label(&self) -> &'static str {
        self.status.map(|s| s.as_str()).unwrap_or(UNKNOWN_STATUS)
    }

    pub fn valid_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter_map(|record| match record {
            ItemRecord::Valid(item) => Some(item),
            ItemRecord::Rejected(_) => None,
        })
    }

    pub fn rejected_items(&self) -> impl Iterator<Item = &RejectedItem> {
        self.items.iter().filter_map(|record| match record {
            ItemRecord::Rejected(item) => Some(item),
            ItemRecord::Valid(_) => None,
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
