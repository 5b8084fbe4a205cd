//! LLM integration crate for Grounded.
//!
//! This crate provides a provider-agnostic abstraction for chat completions
//! over role-tagged turns, used by the grounded drafting stage.
//!
//! # Providers
//! - **Ollama**: `/api/chat` (default)
//!
//! # Example
//! ```no_run
//! use grounded_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::with_timeout("http://localhost:11434", Duration::from_secs(25))?;
//! let request = LlmRequest::new("llama3.1:8b")
//!     .with_system("Answer briefly.")
//!     .with_user("Hello, world!");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, LlmUsage, Role};
pub use factory::create_client;
pub use providers::OllamaClient;
