//! End-to-end engine behaviour over in-memory sources.

use crate::assembler::GENERIC_PROMPT;
use crate::contract::ChatRequest;
use crate::drafting::Drafter;
use crate::engine::Engine;
use crate::evidence::Tool;
use crate::intent::KeywordClassifier;
use crate::orchestrator::Orchestrator;
use crate::records::{Invoice, InventoryItem, Order, Policy, PolicyValue};
use crate::sources::{Lookup, Sources};
use async_trait::async_trait;
use grounded_core::config::{BackendsConfig, DraftingConfig, RetrievalConfig, RoutingConfig};
use grounded_core::{AppError, AppResult};
use grounded_knowledge::embeddings::providers::TrigramProvider;
use grounded_knowledge::{demo_documents, PassageSearch, Retriever, SqliteIndex, UnavailableSearch};
use grounded_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const DISCLAIMER: &str = "Lamentamos el retraso. Si supera 7 días puede solicitar el reembolso.";

/// In-memory backend keyed by the string form of the key.
struct FakeSource<R> {
    name: &'static str,
    records: HashMap<String, R>,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl<R: Clone + Send + Sync> FakeSource<R> {
    fn new(name: &'static str, records: Vec<(&str, R)>) -> Self {
        Self {
            name,
            records: records
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            fail: false,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(name: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(name, vec![])
        }
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn lookup(&self, key: String) -> AppResult<Option<R>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AppError::Source(format!("{} unreachable", self.name)));
        }
        Ok(self.records.get(&key).cloned())
    }
}

#[async_trait]
impl<R: Clone + Send + Sync> Lookup<i64, R> for FakeSource<R> {
    fn source_name(&self) -> &str {
        self.name
    }

    async fn fetch(&self, key: &i64) -> AppResult<Option<R>> {
        self.lookup(key.to_string()).await
    }
}

#[async_trait]
impl<R: Clone + Send + Sync> Lookup<str, R> for FakeSource<R> {
    fn source_name(&self) -> &str {
        self.name
    }

    async fn fetch(&self, key: &str) -> AppResult<Option<R>> {
        self.lookup(key.to_string()).await
    }
}

/// Language model stand-in with a fixed reply or failure.
struct FakeModel {
    reply: Option<String>,
    seen: Mutex<Vec<LlmRequest>>,
}

impl FakeModel {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LlmClient for FakeModel {
    fn provider_name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.seen.lock().unwrap().push(request.clone());
        match &self.reply {
            Some(content) => Ok(LlmResponse {
                content: content.clone(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
            }),
            None => Err(AppError::Llm("Ollama API error (500): model not loaded".to_string())),
        }
    }
}

struct Fixture {
    orders: Arc<FakeSource<Order>>,
    invoices: Arc<FakeSource<Invoice>>,
    inventory: Arc<FakeSource<InventoryItem>>,
    policies: Arc<FakeSource<Policy>>,
    search: Arc<dyn PassageSearch>,
    routing: RoutingConfig,
    backends: BackendsConfig,
}

fn order(id: i64, status: &str, eta: &str) -> Order {
    Order {
        id,
        customer_id: Some(10 + id),
        status: status.to_string(),
        eta: Some(eta.to_string()),
    }
}

fn item(sku: &str, name: &str, valid_to: Option<&str>) -> InventoryItem {
    InventoryItem {
        sku: sku.to_string(),
        name: name.to_string(),
        stock: 12,
        price: 59.9,
        currency: "EUR".to_string(),
        valid_from: "2025-01-01".to_string(),
        valid_to: valid_to.map(String::from),
    }
}

async fn seeded_search() -> Arc<dyn PassageSearch> {
    let retriever = Retriever::new(
        Arc::new(TrigramProvider::new(384)),
        Arc::new(SqliteIndex::in_memory(384).unwrap()),
        &RetrievalConfig::default(),
    )
    .unwrap();
    retriever.ingest(demo_documents()).await.unwrap();
    Arc::new(retriever)
}

impl Fixture {
    async fn new() -> Self {
        Self {
            orders: Arc::new(FakeSource::new(
                "orders-api",
                vec![
                    ("1", order(1, "shipped", "2025-09-20")),
                    ("2", order(2, "delayed", "2025-09-30")),
                ],
            )),
            invoices: Arc::new(FakeSource::new(
                "billing-api",
                vec![(
                    "1",
                    Invoice {
                        id: 100,
                        order_id: 1,
                        amount: 120.5,
                        currency: "EUR".to_string(),
                        due_date: "2025-10-15".to_string(),
                        paid: false,
                    },
                )],
            )),
            inventory: Arc::new(FakeSource::new(
                "inventory-api",
                vec![
                    ("SKU-001", item("SKU-001", "Router AC1200", None)),
                    ("SKU-002", item("SKU-002", "Switch 8 puertos", Some("2025-06-30"))),
                ],
            )),
            policies: Arc::new(FakeSource::new(
                "policy-api",
                vec![(
                    "delayed_order_disclaimer",
                    Policy {
                        key: "delayed_order_disclaimer".to_string(),
                        value: PolicyValue {
                            text: DISCLAIMER.to_string(),
                            extra: Default::default(),
                        },
                    },
                )],
            )),
            search: seeded_search().await,
            routing: RoutingConfig::default(),
            backends: BackendsConfig::default(),
        }
    }

    fn engine(&self, model: Option<Arc<FakeModel>>) -> Engine {
        let sources = Sources {
            orders: self.orders.clone(),
            invoices: self.invoices.clone(),
            inventory: self.inventory.clone(),
            policies: self.policies.clone(),
        };
        let orchestrator = Orchestrator::new(
            sources,
            self.search.clone(),
            Arc::new(KeywordClassifier::new(&self.routing)),
            self.routing.clone(),
            &self.backends,
        );
        let drafter = model.map(|m| {
            Drafter::new(
                m,
                grounded_prompt::drafting_prompt(None).unwrap(),
                &DraftingConfig::default(),
            )
        });
        Engine::new(orchestrator, drafter)
    }
}

#[tokio::test]
async fn test_no_intent_returns_generic_prompt() {
    let fixture = Fixture::new().await;
    let model = FakeModel::replying("no debería usarse");
    let engine = fixture.engine(Some(model.clone()));

    let response = engine.handle(&ChatRequest::new("hola, buenas tardes")).await;

    assert_eq!(response.response, GENERIC_PROMPT);
    assert!(response.tools_used.is_empty());
    assert_eq!(serde_json::to_value(&response.evidence).unwrap(), serde_json::json!({}));
    assert!(model.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_delayed_order_pulls_policy() {
    let fixture = Fixture::new().await;
    let engine = fixture.engine(None);

    let response = engine
        .handle(&ChatRequest::new("pedido").with_order_id(2))
        .await;

    assert_eq!(response.tools_used, vec![Tool::Orders, Tool::Policy]);
    assert!(response.evidence.order.is_some());
    assert_eq!(response.evidence.policy.as_ref().unwrap().text, DISCLAIMER);
    assert!(response.response.contains("2025-09-30"));
    assert!(response.response.contains(DISCLAIMER));
    assert_eq!(fixture.invoices.calls(), 0);
}

#[tokio::test]
async fn test_delayed_order_with_draft() {
    let fixture = Fixture::new().await;
    let model = FakeModel::replying("Su pedido #2 está retrasado; llegará el 30/09.");
    let engine = fixture.engine(Some(model.clone()));

    let response = engine
        .handle(&ChatRequest::new("pedido").with_order_id(2))
        .await;

    assert_eq!(response.tools_used, vec![Tool::Orders, Tool::Policy, Tool::Llm]);
    assert_eq!(response.response, "Su pedido #2 está retrasado; llegará el 30/09.");
    // Evidence is kept when the draft replaces the summary
    assert!(response.evidence.policy.is_some());
    assert!(response.evidence.draft_error.is_none());

    let seen = model.seen.lock().unwrap();
    assert!(seen[0].messages[1].content.contains("[policy] Lamentamos el retraso."));
}

#[tokio::test]
async fn test_shipped_order_skips_policy() {
    let fixture = Fixture::new().await;
    let response = fixture
        .engine(None)
        .handle(&ChatRequest::new("¿y mi pedido?").with_order_id(1))
        .await;

    assert_eq!(response.tools_used, vec![Tool::Orders]);
    assert_eq!(fixture.policies.calls(), 0);
}

#[tokio::test]
async fn test_invoice_requires_resolved_order() {
    let fixture = Fixture::new().await;
    let engine = fixture.engine(None);

    // Billing intent without order intent or id: no order, so no invoice
    let response = engine.handle(&ChatRequest::new("mi factura")).await;
    assert!(response.evidence.invoice.is_none());
    assert_eq!(fixture.invoices.calls(), 0);

    // Order not found: invoice skipped silently
    let response = engine
        .handle(&ChatRequest::new("factura del pedido").with_order_id(99))
        .await;
    assert!(response.evidence.order.is_none());
    assert!(response.evidence.invoice.is_none());
    assert!(response.evidence.order_error.is_none());
    assert_eq!(fixture.invoices.calls(), 0);

    // Order resolved: invoice fetched by the order's id
    let response = engine
        .handle(&ChatRequest::new("factura del pedido").with_order_id(1))
        .await;
    assert_eq!(response.tools_used, vec![Tool::Orders, Tool::Billing]);
    assert!(response.response.contains("Invoice: 120.5 EUR, due 2025-10-15."));
}

#[tokio::test]
async fn test_order_intent_uses_default_id() {
    let fixture = Fixture::new().await;
    let response = fixture
        .engine(None)
        .handle(&ChatRequest::new("estado de mi pedido"))
        .await;

    assert_eq!(response.evidence.order.unwrap().id, 1);
}

#[tokio::test]
async fn test_order_intent_without_default_is_skipped() {
    let mut fixture = Fixture::new().await;
    fixture.routing.default_order_id = None;

    let response = fixture
        .engine(None)
        .handle(&ChatRequest::new("estado de mi pedido"))
        .await;

    assert!(response.tools_used.is_empty());
    assert_eq!(fixture.orders.calls(), 0);
}

#[tokio::test]
async fn test_stale_spec_sheet_is_flagged() {
    let fixture = Fixture::new().await;
    let engine = fixture.engine(None);

    let response = engine
        .handle(&ChatRequest::new("ficha técnica").with_sku("SKU-002"))
        .await;

    let hits = response.evidence.rag.as_ref().unwrap();
    assert!(hits.iter().all(|h| h.passage.sku.as_deref() == Some("SKU-002")));
    assert!(response
        .response
        .contains("(WARNING: outdated document, superseded on 2025-06-30)"));
    assert!(response.response.contains("Source: manual_sku002_v1.pdf."));
    assert_eq!(response.tools_used, vec![Tool::Inventory, Tool::Retrieval]);
}

#[tokio::test]
async fn test_stale_spec_sheet_is_flagged_in_digest() {
    let fixture = Fixture::new().await;
    let model = FakeModel::replying("La ficha del SKU-002 puede estar desactualizada.");
    let engine = fixture.engine(Some(model.clone()));

    engine
        .handle(&ChatRequest::new("ficha técnica").with_sku("SKU-002"))
        .await;

    let seen = model.seen.lock().unwrap();
    let user_turn = &seen[0].messages[1].content;
    assert!(user_turn.contains("[rag] sku=SKU-002 source=manual_sku002_v1.pdf STALE(valid_to=2025-06-30)"));
    assert!(user_turn.contains("[inventory] sku=SKU-002"));
}

#[tokio::test]
async fn test_empty_message_with_sku_queries_by_sku() {
    let fixture = Fixture::new().await;
    let response = fixture
        .engine(None)
        .handle(&ChatRequest::new("").with_sku("SKU-001"))
        .await;

    let top = response.evidence.rag.as_ref().unwrap()[0].passage.clone();
    assert_eq!(top.sku.as_deref(), Some("SKU-001"));
    assert!(response
        .response
        .starts_with("Spec sheet (SKU SKU-001): Especificaciones del SKU-001 (Router AC1200)."));
}

#[tokio::test]
async fn test_draft_failure_keeps_summary_byte_identical() {
    let fixture = Fixture::new().await;
    let request = ChatRequest::new("pedido y ficha").with_order_id(2).with_sku("SKU-002");

    let baseline = fixture.engine(None).handle(&request).await;
    let degraded = fixture
        .engine(Some(FakeModel::failing()))
        .handle(&request)
        .await;

    assert_eq!(degraded.response, baseline.response);
    assert_eq!(degraded.tools_used, baseline.tools_used);
    assert!(!degraded.tools_used.contains(&Tool::Llm));
    assert!(degraded.evidence.draft_error.as_ref().unwrap().contains("model not loaded"));
}

#[tokio::test]
async fn test_blank_draft_falls_back() {
    let fixture = Fixture::new().await;
    let response = fixture
        .engine(Some(FakeModel::replying("   ")))
        .handle(&ChatRequest::new("pedido").with_order_id(1))
        .await;

    assert!(response.response.starts_with("Order #1 is in state 'shipped'"));
    assert!(response.evidence.draft_error.is_some());
}

#[tokio::test]
async fn test_source_failure_is_annotated_not_fatal() {
    let mut fixture = Fixture::new().await;
    fixture.orders = Arc::new(FakeSource::failing("orders-api"));

    let response = fixture
        .engine(None)
        .handle(&ChatRequest::new("factura del pedido").with_order_id(2).with_sku("SKU-001"))
        .await;

    assert!(response.evidence.order.is_none());
    assert!(response.evidence.order_error.as_ref().unwrap().contains("unreachable"));
    assert_eq!(fixture.policies.calls(), 0);
    assert_eq!(fixture.invoices.calls(), 0);
    // Independent slots still answer
    assert_eq!(response.tools_used, vec![Tool::Inventory, Tool::Retrieval]);
    assert!(!response.response.contains("unreachable"));
}

#[tokio::test]
async fn test_slow_source_times_out_into_error_slot() {
    let mut fixture = Fixture::new().await;
    fixture.backends.timeout_secs = 1;
    fixture.inventory = Arc::new(
        FakeSource::new("inventory-api", vec![("SKU-001", item("SKU-001", "Router", None))])
            .slow(Duration::from_secs(3)),
    );

    let response = fixture
        .engine(None)
        .handle(&ChatRequest::new("pedido").with_order_id(1).with_sku("SKU-001"))
        .await;

    assert!(response.evidence.inventory.is_none());
    assert!(response
        .evidence
        .inventory_error
        .as_ref()
        .unwrap()
        .starts_with("Timed out: inventory-api"));
    assert!(response.tools_used.contains(&Tool::Orders));
}

#[tokio::test]
async fn test_retrieval_failure_is_recorded() {
    let mut fixture = Fixture::new().await;
    fixture.search = Arc::new(UnavailableSearch::new("index file is locked"));

    let response = fixture
        .engine(None)
        .handle(&ChatRequest::new("manual").with_sku("SKU-001"))
        .await;

    assert!(response.evidence.rag.is_none());
    assert!(response
        .evidence
        .retrieval_error
        .as_ref()
        .unwrap()
        .contains("index file is locked"));
    assert_eq!(response.tools_used, vec![Tool::Inventory]);
}

#[tokio::test]
async fn test_response_serializes_contract_keys() {
    let fixture = Fixture::new().await;
    let response = fixture
        .engine(None)
        .handle(&ChatRequest::new("pedido").with_order_id(2))
        .await;

    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["tools_used"], serde_json::json!(["orders-api", "policy-api"]));
    assert_eq!(value["evidence"]["order"]["status"], "delayed");
    assert_eq!(value["evidence"]["policy"]["text"], DISCLAIMER);
    assert!(value["evidence"].get("retrieval_error").is_none());
}
