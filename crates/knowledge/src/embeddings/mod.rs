//! Embedding engine for the retrieval index.
//!
//! Providers turn text into fixed-dimension vectors. The retriever decides
//! the input role (query or passage) and normalizes every vector, so
//! similarity between stored and query vectors is a plain dot product.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};

/// Input role under the asymmetric query/passage convention.
///
/// Indexed text and search text are prefixed differently so the model
/// treats them as distinct inputs. Mixing them up degrades ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingRole {
    Query,
    Passage,
}

impl EmbeddingRole {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Query => "query: ",
            Self::Passage => "passage: ",
        }
    }

    /// Prefix `text` for this role.
    pub fn encode(&self, text: &str) -> String {
        format!("{}{}", self.prefix(), text)
    }

    /// Remove a leading role prefix, if any.
    ///
    /// For providers that hash surface text, where the prefix would only
    /// add noise shared by every input of the same role.
    pub fn strip(text: &str) -> &str {
        [Self::Query, Self::Passage]
            .iter()
            .find_map(|role| text.strip_prefix(role.prefix()))
            .unwrap_or(text)
    }
}

/// Scale `vector` to unit length in place. Zero vectors are left as-is.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Dot product; equals cosine similarity for unit vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
