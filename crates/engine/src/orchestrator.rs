//! Evidence orchestration.
//!
//! Slots form a small dependency graph evaluated once per request:
//!
//! ```text
//! order ──┬── policy   (order status is the delay state)
//!         └── invoice  (billing intent)
//! inventory
//! retrieval
//! ```
//!
//! The order chain, inventory and retrieval run concurrently. Each call is
//! bounded by the backend timeout; absent records are skipped silently and
//! failures are recorded in the slot's error key. Nothing here fails the
//! request.

use crate::contract::ChatRequest;
use crate::evidence::{fill, EvidenceBag, Tool};
use crate::intent::{Intent, IntentClassifier};
use crate::records::{Invoice, InventoryItem, Order, PolicyValue};
use crate::sources::{Lookup, Sources};
use grounded_core::config::{BackendsConfig, RoutingConfig};
use grounded_core::AppError;
use grounded_knowledge::{MetadataFilter, PassageSearch, RetrievedPassage};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one slot.
#[derive(Debug)]
enum Fetch<T> {
    Skipped,
    Absent,
    Found(T),
    Failed(String),
}

struct OrderChain {
    order: Fetch<Order>,
    policy: Fetch<PolicyValue>,
    invoice: Fetch<Invoice>,
}

/// Evidence and the sources that contributed to it.
#[derive(Debug, Clone, Default)]
pub struct Gathered {
    pub evidence: EvidenceBag,
    pub tools_used: Vec<Tool>,
    pub intent: Intent,
}

pub struct Orchestrator {
    sources: Sources,
    search: Arc<dyn PassageSearch>,
    classifier: Arc<dyn IntentClassifier>,
    routing: RoutingConfig,
    delay_status: String,
    delay_policy_key: String,
    call_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        sources: Sources,
        search: Arc<dyn PassageSearch>,
        classifier: Arc<dyn IntentClassifier>,
        routing: RoutingConfig,
        backends: &BackendsConfig,
    ) -> Self {
        Self {
            sources,
            search,
            classifier,
            routing,
            delay_status: backends.delay_status.clone(),
            delay_policy_key: backends.delay_policy_key.clone(),
            call_timeout: backends.timeout(),
        }
    }

    /// Consult every triggered source and collect the evidence.
    ///
    /// `tools_used` lists successful sources in dependency order:
    /// orders, policy, billing, inventory, retrieval.
    pub async fn gather(&self, request: &ChatRequest) -> Gathered {
        let intent = self.classifier.classify(&request.message);
        tracing::debug!(?intent, "Classified message");

        let (chain, inventory, rag) = tokio::join!(
            self.order_chain(request, intent),
            self.inventory_slot(request, intent),
            self.retrieval_slot(request, intent),
        );

        let mut gathered = Gathered {
            intent,
            ..Gathered::default()
        };
        let evidence = &mut gathered.evidence;
        let tools = &mut gathered.tools_used;

        record(chain.order, &mut evidence.order, &mut evidence.order_error, Tool::Orders, tools);
        record(chain.policy, &mut evidence.policy, &mut evidence.policy_error, Tool::Policy, tools);
        record(chain.invoice, &mut evidence.invoice, &mut evidence.invoice_error, Tool::Billing, tools);
        record(inventory, &mut evidence.inventory, &mut evidence.inventory_error, Tool::Inventory, tools);
        record(rag, &mut evidence.rag, &mut evidence.retrieval_error, Tool::Retrieval, tools);

        gathered
    }

    async fn order_chain(&self, request: &ChatRequest, intent: Intent) -> OrderChain {
        let mut chain = OrderChain {
            order: Fetch::Skipped,
            policy: Fetch::Skipped,
            invoice: Fetch::Skipped,
        };

        if request.order_id.is_none() && !intent.order {
            return chain;
        }
        let Some(order_id) = request.order_id.or(self.routing.default_order_id) else {
            tracing::debug!("Order intent without an order id and no default configured");
            return chain;
        };

        chain.order = self.call(self.sources.orders.as_ref(), &order_id).await;
        let Fetch::Found(order) = &chain.order else {
            return chain;
        };

        let policy = async {
            if order.status != self.delay_status {
                return Fetch::Skipped;
            }
            match self
                .call(self.sources.policies.as_ref(), self.delay_policy_key.as_str())
                .await
            {
                Fetch::Found(policy) => Fetch::Found(policy.value),
                Fetch::Absent => Fetch::Absent,
                Fetch::Failed(reason) => Fetch::Failed(reason),
                Fetch::Skipped => Fetch::Skipped,
            }
        };
        let invoice = async {
            if !intent.billing {
                return Fetch::Skipped;
            }
            self.call(self.sources.invoices.as_ref(), &order.id).await
        };

        let (policy, invoice) = tokio::join!(policy, invoice);
        chain.policy = policy;
        chain.invoice = invoice;
        chain
    }

    async fn inventory_slot(&self, request: &ChatRequest, intent: Intent) -> Fetch<InventoryItem> {
        if request.sku().is_none() && !intent.inventory {
            return Fetch::Skipped;
        }
        let Some(sku) = request.sku().or(self.routing.default_sku.as_deref()) else {
            tracing::debug!("Inventory intent without a SKU and no default configured");
            return Fetch::Skipped;
        };

        self.call(self.sources.inventory.as_ref(), sku).await
    }

    async fn retrieval_slot(
        &self,
        request: &ChatRequest,
        intent: Intent,
    ) -> Fetch<Vec<RetrievedPassage>> {
        let sku = request.sku();
        if sku.is_none() && !intent.specs {
            return Fetch::Skipped;
        }

        let query = retrieval_query(&request.message, sku);
        let filter = sku.map(MetadataFilter::sku).unwrap_or_default();
        tracing::debug!(%query, %filter, "Searching knowledge base");

        let search = self.search.search(&query, &filter, self.routing.top_k);
        match tokio::time::timeout(self.call_timeout, search).await {
            Ok(Ok(hits)) if hits.is_empty() => Fetch::Absent,
            Ok(Ok(hits)) => Fetch::Found(hits),
            Ok(Err(e)) => Fetch::Failed(e.to_string()),
            Err(_) => Fetch::Failed(
                AppError::Timeout(format!("retrieval after {:?}", self.call_timeout)).to_string(),
            ),
        }
    }

    async fn call<K, R>(&self, source: &dyn Lookup<K, R>, key: &K) -> Fetch<R>
    where
        K: ?Sized + Sync,
        R: Send,
    {
        match tokio::time::timeout(self.call_timeout, source.fetch(key)).await {
            Ok(Ok(Some(record))) => Fetch::Found(record),
            Ok(Ok(None)) => {
                tracing::debug!(source = source.source_name(), "Record not found");
                Fetch::Absent
            }
            Ok(Err(e)) => Fetch::Failed(e.to_string()),
            Err(_) => Fetch::Failed(
                AppError::Timeout(format!(
                    "{} after {:?}",
                    source.source_name(),
                    self.call_timeout
                ))
                .to_string(),
            ),
        }
    }
}

/// Query text for the retrieval slot.
///
/// The raw message is used when present; otherwise a query naming the SKU.
pub fn retrieval_query(message: &str, sku: Option<&str>) -> String {
    if !message.trim().is_empty() {
        return message.to_string();
    }
    match sku {
        Some(sku) => format!("Especificaciones del {}", sku),
        None => "ficha técnica".to_string(),
    }
}

fn record<T>(
    fetch: Fetch<T>,
    slot: &mut Option<T>,
    error_slot: &mut Option<String>,
    tool: Tool,
    tools_used: &mut Vec<Tool>,
) {
    match fetch {
        Fetch::Found(value) => {
            if fill(slot, value) {
                tools_used.push(tool);
            }
        }
        Fetch::Failed(reason) => {
            tracing::warn!(source = %tool, error = %reason, "Evidence source failed");
            fill(error_slot, reason);
        }
        Fetch::Absent | Fetch::Skipped => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_query() {
        assert_eq!(retrieval_query("ficha técnica", Some("SKU-002")), "ficha técnica");
        assert_eq!(retrieval_query("  ", Some("SKU-002")), "Especificaciones del SKU-002");
        assert_eq!(retrieval_query("", None), "ficha técnica");
    }
}
