//! Request handling: gather, assemble, optionally draft.

use crate::assembler::summarize;
use crate::contract::{ChatRequest, ChatResponse};
use crate::drafting::Drafter;
use crate::evidence::{fill, Tool};
use crate::intent::KeywordClassifier;
use crate::orchestrator::Orchestrator;
use crate::sources::Sources;
use grounded_core::{AppConfig, AppResult};
use grounded_knowledge::PassageSearch;
use grounded_llm::create_client;
use grounded_prompt::drafting_prompt;
use std::sync::Arc;
use tracing::Instrument;

/// The grounded answering engine. One instance serves every request.
pub struct Engine {
    orchestrator: Orchestrator,
    drafter: Option<Drafter>,
}

impl Engine {
    pub fn new(orchestrator: Orchestrator, drafter: Option<Drafter>) -> Self {
        Self {
            orchestrator,
            drafter,
        }
    }

    /// Wire HTTP sources, the keyword classifier and (if enabled) the
    /// drafting client from configuration.
    pub fn from_config(config: &AppConfig, search: Arc<dyn PassageSearch>) -> AppResult<Self> {
        let sources = Sources::from_config(&config.backends)?;
        let orchestrator = Orchestrator::new(
            sources,
            search,
            Arc::new(KeywordClassifier::new(&config.routing)),
            config.routing.clone(),
            &config.backends,
        );

        let drafter = if config.drafting.enabled {
            let client = create_client(&config.drafting)?;
            let prompt = drafting_prompt(config.drafting.prompt_file.as_deref())?;
            Some(Drafter::new(client, prompt, &config.drafting))
        } else {
            tracing::info!("Drafting disabled; responses use the deterministic summary");
            None
        };

        Ok(Self::new(orchestrator, drafter))
    }

    /// Answer one request. Never fails: source, retrieval and drafting
    /// problems are recorded in the evidence instead.
    pub async fn handle(&self, request: &ChatRequest) -> ChatResponse {
        let span = tracing::info_span!(
            "chat",
            order_id = ?request.order_id,
            sku = request.sku(),
            intent = tracing::field::Empty,
        );

        async move {
            let gathered = self.orchestrator.gather(request).await;
            tracing::Span::current().record("intent", tracing::field::debug(&gathered.intent));

            let mut evidence = gathered.evidence;
            let mut tools_used = gathered.tools_used;
            let mut response = summarize(&evidence);

            if let Some(drafter) = &self.drafter {
                if evidence.has_substantive() {
                    match drafter.draft(&request.message, &evidence, request.lang()).await {
                        Ok(draft) => {
                            response = draft;
                            tools_used.push(Tool::Llm);
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Drafting failed; using deterministic summary");
                            fill(&mut evidence.draft_error, e.to_string());
                        }
                    }
                }
            }

            let tools: Vec<&str> = tools_used.iter().map(Tool::as_str).collect();
            tracing::info!(tools_used = ?tools, "Chat request answered");

            ChatResponse {
                response,
                tools_used,
                evidence,
            }
        }
        .instrument(span)
        .await
    }
}
