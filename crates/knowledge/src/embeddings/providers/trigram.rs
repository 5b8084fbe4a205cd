//! Character-trigram embedding provider.
//!
//! Hashes word trigrams and whole words into a fixed number of buckets.
//! Not semantic, but deterministic, offline, and content-dependent, which
//! is what tests and demo deployments need.
//!
//! Query and passage role prefixes are dropped before hashing, so the same
//! body embeds identically in either role.

use crate::embeddings::provider::EmbeddingProvider;
use crate::embeddings::EmbeddingRole;
use grounded_core::AppResult;
use std::collections::{HashMap, HashSet};

/// Function words ignored when hashing (English and Spanish).
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "this", "that", "are", "was", "were", "has", "have",
    "its", "their", "they", "them", "which", "del", "los", "las", "con", "para", "por", "una",
    "uno", "que", "como", "sus", "est", "esta", "este",
];

/// Trigram-based embedding provider for local, offline operation.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
    stop_words: HashSet<&'static str>,
}

impl TrigramProvider {
    /// Create a new trigram provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    fn tokens(&self, text: &str) -> HashMap<String, usize> {
        let lower = text.to_lowercase();
        let mut freq = HashMap::new();
        for word in lower
            .split(|c: char| !(c.is_alphanumeric() || c == '-'))
            .map(|w| w.trim_matches('-'))
            .filter(|w| w.chars().count() >= 3 && !self.stop_words.contains(w))
        {
            *freq.entry(word.to_string()).or_insert(0) += 1;
        }
        freq
    }

    fn bucket(&self, bytes: &[u8], multiplier: u64) -> usize {
        let hash = bytes
            .iter()
            .fold(0u64, |acc, &b| acc.wrapping_mul(multiplier).wrapping_add(b as u64));
        (hash % self.dimensions as u64) as usize
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return embedding;
        }

        for (word, freq) in self.tokens(EmbeddingRole::strip(text)) {
            // Pad so word boundaries produce their own trigrams
            let padded: Vec<char> = format!(" {} ", word).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                let idx = self.bucket(trigram.as_bytes(), 37);
                embedding[idx] += (freq as f32).sqrt();
            }

            let idx = self.bucket(word.as_bytes(), 31);
            embedding[idx] += freq as f32;
        }

        crate::embeddings::l2_normalize(&mut embedding);
        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.generate(text)).collect())
    }
}
