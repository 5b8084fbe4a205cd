//! Message intent detection.
//!
//! Intents are trigger predicates for the evidence slots. The keyword
//! classifier is a case-insensitive substring test over small vocabularies;
//! any other classifier can sit behind the same trait.

use grounded_core::config::RoutingConfig;

/// Which kinds of evidence a message asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Intent {
    pub order: bool,
    pub billing: bool,
    pub inventory: bool,
    pub specs: bool,
}

pub trait IntentClassifier: Send + Sync {
    fn classify(&self, message: &str) -> Intent;
}

/// Substring matcher over per-intent keyword lists.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    order: Vec<String>,
    billing: Vec<String>,
    inventory: Vec<String>,
    specs: Vec<String>,
}

impl KeywordClassifier {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            order: lowercase(&config.order_keywords),
            billing: lowercase(&config.billing_keywords),
            inventory: lowercase(&config.inventory_keywords),
            specs: lowercase(&config.specs_keywords),
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(&RoutingConfig::default())
    }
}

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, message: &str) -> Intent {
        let text = message.to_lowercase();
        let hit = |words: &[String]| words.iter().any(|w| text.contains(w.as_str()));

        Intent {
            order: hit(&self.order),
            billing: hit(&self.billing),
            inventory: hit(&self.inventory),
            specs: hit(&self.specs),
        }
    }
}

fn lowercase(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}
