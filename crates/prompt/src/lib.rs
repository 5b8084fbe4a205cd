//! Prompt system for Grounded.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions (system and user templates)
//! - Handlebars template rendering
//! - A built-in grounded drafting prompt that a YAML file can replace

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{drafting_prompt, load_prompt};
pub use types::{BuiltPrompt, PromptDefinition};
