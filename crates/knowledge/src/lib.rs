//! Semantic retrieval over product documentation.
//!
//! Documents are embedded with asymmetric query/passage prefixes, normalized,
//! and stored in a local SQLite vector index with their metadata. Searches
//! apply metadata filters before top-k truncation.

pub mod corpus;
pub mod demo;
pub mod embeddings;
pub mod filter;
pub mod index;
pub mod passage;
pub mod retriever;
pub mod vector_index;


pub use corpus::{load_corpus, Corpus};
pub use demo::demo_documents;
pub use embeddings::{create_provider, EmbeddingProvider, EmbeddingRole};
pub use filter::{FilterField, MetadataFilter};
pub use index::SqliteIndex;
pub use passage::{Document, IndexStats, Passage, RetrievedPassage};
pub use retriever::{PassageSearch, Retriever, UnavailableSearch};
pub use vector_index::VectorIndex;
