//! Knowledge passage types.

use serde::{Deserialize, Serialize};

/// A document submitted for ingestion.
///
/// Documents without body text are skipped. A missing `id` gets a fresh
/// UUID; a missing `lang` gets the configured default. Validity dates are
/// ISO `YYYY-MM-DD` when known, otherwise the text as written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub id: Option<String>,
    pub text: String,
    pub sku: Option<String>,
    pub source: Option<String>,
    pub lang: Option<String>,
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
    pub version: Option<String>,
    pub section_id: Option<String>,
    pub tags: Vec<String>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_validity(mut self, from: Option<&str>, to: Option<&str>) -> Self {
        self.valid_from = from.map(String::from);
        self.valid_to = to.map(String::from);
        self
    }
}

/// A passage as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<String>,
    /// Set when a newer revision supersedes this passage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Passage {
    /// Stale passages stay retrievable; callers flag them.
    pub fn is_stale(&self) -> bool {
        self.valid_to.is_some()
    }

    /// First non-empty line of the body.
    pub fn first_line(&self) -> &str {
        self.text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("")
    }
}

/// A passage returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    #[serde(flatten)]
    pub passage: Passage,

    /// Cosine similarity to the query
    pub score: f32,
}

/// Index statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub passages: u64,
    pub stale_passages: u64,
}
