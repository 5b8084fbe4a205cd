//! Prompt types for Grounded.
//!
//! This module defines the domain entities for the prompt system.

use serde::{Deserialize, Serialize};

/// A prompt definition loaded from YAML.
///
/// Both `system` and `template` are Handlebars templates rendered against
/// the same variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// System instruction template
    #[serde(default)]
    pub system: Option<String>,

    /// User turn template
    pub template: String,
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,
}
