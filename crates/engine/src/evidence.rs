//! Per-request evidence bag and tools-used log.

use crate::records::{Invoice, InventoryItem, Order, PolicyValue};
use grounded_knowledge::RetrievedPassage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A source consulted successfully while answering a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tool {
    #[serde(rename = "orders-api")]
    Orders,
    #[serde(rename = "policy-api")]
    Policy,
    #[serde(rename = "billing-api")]
    Billing,
    #[serde(rename = "inventory-api")]
    Inventory,
    #[serde(rename = "rag")]
    Retrieval,
    #[serde(rename = "llm")]
    Llm,
}

impl Tool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orders => "orders-api",
            Self::Policy => "policy-api",
            Self::Billing => "billing-api",
            Self::Inventory => "inventory-api",
            Self::Retrieval => "rag",
            Self::Llm => "llm",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence gathered for one request.
///
/// Absent slots are omitted from the serialized form. Slots are written at
/// most once per request; a later write to a filled slot is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBag {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<Invoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<InventoryItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rag: Option<Vec<RetrievedPassage>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_error: Option<String>,
}

impl EvidenceBag {
    /// Whether any evidence worth drafting from is present.
    ///
    /// An invoice alone does not count.
    pub fn has_substantive(&self) -> bool {
        self.order.is_some() || self.inventory.is_some() || self.rag.is_some()
    }

    /// The highest-scoring retrieved passage, if any.
    pub fn top_passage(&self) -> Option<&RetrievedPassage> {
        self.rag.as_ref().and_then(|hits| hits.first())
    }
}

/// Fill `slot` unless it already holds a value. Returns whether it was written.
pub(crate) fn fill<T>(slot: &mut Option<T>, value: T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}
