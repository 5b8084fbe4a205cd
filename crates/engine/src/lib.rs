//! Evidence orchestration and response assembly.
//!
//! A request is classified into intents, the matching backend sources and
//! the knowledge base are consulted under partial-failure tolerance, and
//! the evidence is rendered either as a deterministic summary or as a
//! language-model draft grounded in that evidence.

pub mod assembler;
pub mod contract;
pub mod drafting;
pub mod engine;
pub mod evidence;
pub mod intent;
pub mod orchestrator;
pub mod records;
pub mod sources;

#[cfg(test)]
mod tests;

pub use assembler::{summarize, GENERIC_PROMPT};
pub use contract::{ChatRequest, ChatResponse};
pub use drafting::{evidence_digest, Drafter};
pub use engine::Engine;
pub use evidence::{EvidenceBag, Tool};
pub use intent::{Intent, IntentClassifier, KeywordClassifier};
pub use orchestrator::{Gathered, Orchestrator};
pub use records::{Invoice, InventoryItem, Order, Policy, PolicyValue};
pub use sources::{BillingApi, HttpSource, InventoryApi, Lookup, OrdersApi, PolicyApi, Sources};
