//! Record shapes returned by the backend data services.

use serde::{Deserialize, Serialize};

/// `GET /orders/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    #[serde(default)]
    pub customer_id: Option<i64>,
    pub status: String,
    #[serde(default)]
    pub eta: Option<String>,
}

/// `GET /invoices/by-order/{order_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub order_id: i64,
    pub amount: f64,
    pub currency: String,
    pub due_date: String,
    pub paid: bool,
}

/// `GET /inventory/{sku}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub sku: String,
    pub name: String,
    pub stock: i64,
    pub price: f64,
    pub currency: String,
    pub valid_from: String,
    /// Set when the record has been superseded
    #[serde(default)]
    pub valid_to: Option<String>,
}

impl InventoryItem {
    pub fn is_stale(&self) -> bool {
        self.valid_to.is_some()
    }
}

/// `GET /policy/{key}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub key: String,
    pub value: PolicyValue,
}

/// Policy payload. Only `text` is interpreted; other fields pass through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyValue {
    pub text: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
