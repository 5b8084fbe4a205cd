//! Metadata filters for vector search.
//!
//! Values supplied for one field are OR'd; fields are AND'd. Matching is
//! exact equality, and a passage without the field never matches it.

use crate::passage::Passage;
use std::collections::BTreeMap;
use std::fmt;

/// Passage metadata that can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterField {
    Sku,
    Source,
    Lang,
    Version,
    SectionId,
    /// Matches when any of the passage's tags equals a value
    Tags,
}

impl FilterField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sku => "sku",
            Self::Source => "source",
            Self::Lang => "lang",
            Self::Version => "version",
            Self::SectionId => "section_id",
            Self::Tags => "tags",
        }
    }

    fn matches(&self, passage: &Passage, value: &str) -> bool {
        let field = match self {
            Self::Sku => passage.sku.as_deref(),
            Self::Source => passage.source.as_deref(),
            Self::Lang => Some(passage.lang.as_str()),
            Self::Version => passage.version.as_deref(),
            Self::SectionId => passage.section_id.as_deref(),
            Self::Tags => return passage.tags.iter().any(|t| t == value),
        };
        field == Some(value)
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equality filter over passage metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    conditions: BTreeMap<FilterField, Vec<String>>,
}

impl MetadataFilter {
    /// Create a filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on a single SKU.
    pub fn sku(sku: impl Into<String>) -> Self {
        Self::new().with(FilterField::Sku, sku)
    }

    /// Add an accepted value for `field`.
    pub fn with(mut self, field: FilterField, value: impl Into<String>) -> Self {
        self.conditions.entry(field).or_default().push(value.into());
        self
    }

    /// Add several accepted values for `field`.
    pub fn with_any<I, S>(mut self, field: FilterField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conditions
            .entry(field)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether `passage` satisfies every field condition.
    pub fn matches(&self, passage: &Passage) -> bool {
        self.conditions
            .iter()
            .all(|(field, values)| values.iter().any(|v| field.matches(passage, v)))
    }
}

impl fmt::Display for MetadataFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .conditions
            .iter()
            .map(|(field, values)| format!("{}={}", field, values.join("|")))
            .collect();
        f.write_str(&parts.join(","))
    }
}
