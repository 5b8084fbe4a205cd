//! Grounded drafting: rewrite the evidence with a language model.
//!
//! The model sees a compact digest of the evidence, never the raw records,
//! and is instructed to answer only from it.

use crate::evidence::EvidenceBag;
use grounded_core::config::DraftingConfig;
use grounded_core::{AppError, AppResult};
use grounded_llm::{LlmClient, LlmRequest};
use grounded_prompt::{build_prompt, PromptDefinition};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const EXCERPT_CHARS: usize = 160;

pub struct Drafter {
    client: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl Drafter {
    pub fn new(client: Arc<dyn LlmClient>, prompt: PromptDefinition, config: &DraftingConfig) -> Self {
        Self {
            client,
            prompt,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
        }
    }

    /// Ask the model for a grounded reply.
    ///
    /// Errors, timeouts and blank replies are all failures; the caller keeps
    /// its deterministic summary.
    pub async fn draft(&self, message: &str, evidence: &EvidenceBag, lang: &str) -> AppResult<String> {
        let mut variables = HashMap::new();
        variables.insert("message".to_string(), message.to_string());
        variables.insert("evidence".to_string(), evidence_digest(evidence));
        variables.insert("lang".to_string(), lang.to_string());

        let built = build_prompt(&self.prompt, variables)?;

        let mut request = LlmRequest::new(&self.model).with_temperature(self.temperature);
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        let request = request.with_user(built.user);

        let response = tokio::time::timeout(self.timeout, self.client.complete(&request))
            .await
            .map_err(|_| AppError::Timeout(format!("drafting after {:?}", self.timeout)))??;

        let reply = response.content.trim();
        if reply.is_empty() {
            return Err(AppError::Llm("Model returned an empty draft".to_string()));
        }

        tracing::debug!(
            provider = self.client.provider_name(),
            tokens = response.usage.total_tokens,
            "Draft received"
        );
        Ok(reply.to_string())
    }
}

/// One tagged line per present slot, in the assembler's order.
pub fn evidence_digest(evidence: &EvidenceBag) -> String {
    let mut lines = Vec::new();

    if let Some(order) = &evidence.order {
        lines.push(format!(
            "[order] id={} status={} eta={}",
            order.id,
            order.status,
            order.eta.as_deref().unwrap_or("unknown")
        ));
    }
    if let Some(policy) = &evidence.policy {
        lines.push(format!("[policy] {}", policy.text));
    }
    if let Some(invoice) = &evidence.invoice {
        lines.push(format!(
            "[invoice] amount={} currency={} due={} paid={}",
            invoice.amount, invoice.currency, invoice.due_date, invoice.paid
        ));
    }
    if let Some(item) = &evidence.inventory {
        let mut line = format!(
            "[inventory] sku={} name={} stock={} price={} {}",
            item.sku, item.name, item.stock, item.price, item.currency
        );
        if let Some(to) = &item.valid_to {
            line.push_str(&format!(" STALE(valid_to={})", to));
        }
        lines.push(line);
    }
    for hit in evidence.rag.iter().flatten() {
        let passage = &hit.passage;
        let mut line = format!(
            "[rag] sku={} source={}",
            passage.sku.as_deref().unwrap_or("-"),
            passage.source.as_deref().unwrap_or("-")
        );
        if let Some(to) = &passage.valid_to {
            line.push_str(&format!(" STALE(valid_to={})", to));
        }
        line.push_str(&format!(" text=\"{}\"", excerpt(&passage.text)));
        lines.push(line);
    }

    lines.join("\n")
}

fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{InventoryItem, Order};
    use grounded_knowledge::{Passage, RetrievedPassage};
    use grounded_llm::{LlmResponse, LlmUsage};
    use std::sync::Mutex;

    /// Replies with a fixed string and records the last request.
    struct ScriptedClient {
        reply: AppResult<String>,
        delay: Option<Duration>,
        seen: Mutex<Option<LlmRequest>>,
    }

    impl ScriptedClient {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                delay: None,
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedClient {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            *self.seen.lock().unwrap() = Some(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok(content) => Ok(LlmResponse {
                    content: content.clone(),
                    model: request.model.clone(),
                    usage: LlmUsage::default(),
                }),
                Err(e) => Err(AppError::Llm(e.to_string())),
            }
        }
    }

    fn evidence() -> EvidenceBag {
        EvidenceBag {
            order: Some(Order {
                id: 2,
                customer_id: None,
                status: "delayed".to_string(),
                eta: Some("2025-09-30".to_string()),
            }),
            inventory: Some(InventoryItem {
                sku: "SKU-002".to_string(),
                name: "Switch".to_string(),
                stock: 3,
                price: 35.0,
                currency: "EUR".to_string(),
                valid_from: "2023-02-01".to_string(),
                valid_to: None,
            }),
            rag: Some(vec![RetrievedPassage {
                passage: Passage {
                    id: "p".to_string(),
                    text: "Especificaciones del SKU-002\n- QoS básica".to_string(),
                    sku: Some("SKU-002".to_string()),
                    source: Some("manual_sku002_v1.pdf".to_string()),
                    lang: "es".to_string(),
                    valid_from: None,
                    valid_to: Some("2025-06-30".to_string()),
                    version: None,
                    section_id: None,
                    tags: vec![],
                },
                score: 0.8,
            }]),
            ..EvidenceBag::default()
        }
    }

    fn drafter(client: Arc<ScriptedClient>) -> Drafter {
        Drafter::new(
            client,
            grounded_prompt::drafting_prompt(None).unwrap(),
            &DraftingConfig {
                timeout_secs: 1,
                ..DraftingConfig::default()
            },
        )
    }

    #[test]
    fn test_digest_lines() {
        let digest = evidence_digest(&evidence());
        let lines: Vec<&str> = digest.lines().collect();

        assert_eq!(lines[0], "[order] id=2 status=delayed eta=2025-09-30");
        assert_eq!(lines[1], "[inventory] sku=SKU-002 name=Switch stock=3 price=35 EUR");
        assert_eq!(
            lines[2],
            "[rag] sku=SKU-002 source=manual_sku002_v1.pdf STALE(valid_to=2025-06-30) \
             text=\"Especificaciones del SKU-002 - QoS básica\""
        );
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let long = "ñ".repeat(400);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_CHARS + 3);
        assert!(cut.ends_with("..."));
    }

    #[tokio::test]
    async fn test_draft_sends_system_and_user_turns() {
        let client = Arc::new(ScriptedClient::replying("  Su pedido llega el 30.  "));
        let reply = drafter(client.clone())
            .draft("¿Dónde está mi pedido?", &evidence(), "en")
            .await
            .unwrap();
        assert_eq!(reply, "Su pedido llega el 30.");

        let request = client.seen.lock().unwrap().clone().unwrap();
        assert_eq!(request.model, "llama3.1:8b");
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(320));
        assert_eq!(request.messages.len(), 2);
        assert!(request.messages[0].content.contains("\"en\""));
        assert!(request.messages[1].content.contains("¿Dónde está mi pedido?"));
        assert!(request.messages[1].content.contains("[order] id=2"));
    }

    #[tokio::test]
    async fn test_blank_draft_is_error() {
        let client = Arc::new(ScriptedClient::replying("   "));
        let err = drafter(client).draft("hola", &evidence(), "es").await.unwrap_err();
        assert!(matches!(err, AppError::Llm(_)));
    }

    #[tokio::test]
    async fn test_slow_model_times_out() {
        let client = Arc::new(ScriptedClient {
            reply: Ok("tarde".to_string()),
            delay: Some(Duration::from_secs(3)),
            seen: Mutex::new(None),
        });
        let err = drafter(client).draft("hola", &evidence(), "es").await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
    }
}
