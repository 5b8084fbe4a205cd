//! Semantic retriever: embedding plus vector index behind one handle.
//!
//! The retriever is built once by the composition root (`connect`), shared
//! by reference for the life of the process, and released with `close`.

use crate::embeddings::{create_provider, l2_normalize, EmbeddingProvider, EmbeddingRole};
use crate::filter::MetadataFilter;
use crate::index::SqliteIndex;
use crate::passage::{Document, IndexStats, Passage, RetrievedPassage};
use crate::vector_index::VectorIndex;
use grounded_core::config::RetrievalConfig;
use grounded_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Instant;

/// Read-only search seam used by the request path.
#[async_trait::async_trait]
pub trait PassageSearch: Send + Sync {
    /// Top-k passages for `query`, by descending similarity.
    async fn search(
        &self,
        query: &str,
        filter: &MetadataFilter,
        top_k: usize,
    ) -> AppResult<Vec<RetrievedPassage>>;
}

/// Stand-in used when the retriever could not be connected at startup.
///
/// Every search fails with the original reason, so requests record a
/// retrieval error instead of the process refusing to start.
#[derive(Debug, Clone)]
pub struct UnavailableSearch {
    reason: String,
}

impl UnavailableSearch {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait::async_trait]
impl PassageSearch for UnavailableSearch {
    async fn search(
        &self,
        _query: &str,
        _filter: &MetadataFilter,
        _top_k: usize,
    ) -> AppResult<Vec<RetrievedPassage>> {
        Err(AppError::Knowledge(format!(
            "Retrieval unavailable: {}",
            self.reason
        )))
    }
}

/// Embedding provider and vector index, with ingestion and search.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    batch_size: usize,
    default_lang: String,
    min_score: Option<f32>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder)
            .field("dimensions", &self.index.dimensions())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Retriever {
    /// Assemble a retriever from already-built parts.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        config: &RetrievalConfig,
    ) -> AppResult<Self> {
        if embedder.dimensions() != index.dimensions() {
            return Err(AppError::Knowledge(format!(
                "Embedding provider produces {} dimensions but the index expects {}",
                embedder.dimensions(),
                index.dimensions()
            )));
        }

        Ok(Self {
            embedder,
            index,
            batch_size: config.batch_size.max(1),
            default_lang: config.default_lang.clone(),
            min_score: config.min_score,
        })
    }

    /// Build the embedding provider, verify it, and open the index.
    pub async fn connect(config: &RetrievalConfig) -> AppResult<Self> {
        let embedder = create_provider(&config.embedding)?;
        embedder.verify().await?;

        let index = SqliteIndex::open(&config.index_path, config.embedding.dimensions)?;

        tracing::info!(
            provider = embedder.provider_name(),
            model = embedder.model_name(),
            index = %config.index_path.display(),
            "Retriever connected"
        );

        Self::new(embedder, Arc::new(index), config)
    }

    /// Embed and upsert documents in fixed-size batches.
    ///
    /// Documents with blank text are skipped. Returns the number of
    /// passages written.
    pub async fn ingest(&self, documents: Vec<Document>) -> AppResult<usize> {
        let start = Instant::now();
        let passages = self.to_passages(documents);

        let mut written = 0;
        for batch in passages.chunks(self.batch_size) {
            let rows = self.embed_rows(batch).await?;
            written += self.with_index(move |index| index.upsert(&rows)).await?;
            tracing::debug!("Upserted batch of {} passages", batch.len());
        }

        tracing::info!(
            "Ingested {} passages in {:.2}s",
            written,
            start.elapsed().as_secs_f64()
        );

        Ok(written)
    }

    /// Replace the whole index with `documents`.
    ///
    /// Everything is embedded before the index is touched, and the swap is a
    /// single transaction, so a failure leaves the old contents in place.
    pub async fn replace(&self, documents: Vec<Document>) -> AppResult<usize> {
        let passages = self.to_passages(documents);

        let mut rows = Vec::with_capacity(passages.len());
        for batch in passages.chunks(self.batch_size) {
            rows.extend(self.embed_rows(batch).await?);
        }

        self.with_index(move |index| index.replace_all(&rows)).await
    }

    fn to_passages(&self, documents: Vec<Document>) -> Vec<Passage> {
        let total = documents.len();
        let passages: Vec<Passage> = documents
            .into_iter()
            .filter(|d| !d.text.trim().is_empty())
            .map(|d| self.to_passage(d))
            .collect();

        if passages.len() < total {
            tracing::debug!("Skipped {} documents without text", total - passages.len());
        }
        passages
    }

    async fn embed_rows(&self, batch: &[Passage]) -> AppResult<Vec<(Passage, Vec<f32>)>> {
        let inputs: Vec<String> = batch
            .iter()
            .map(|p| EmbeddingRole::Passage.encode(&p.text))
            .collect();

        let embeddings = self.embedder.embed_batch(&inputs).await?;
        if embeddings.len() != batch.len() {
            return Err(AppError::Knowledge(format!(
                "Embedding provider returned {} vectors for {} passages",
                embeddings.len(),
                batch.len()
            )));
        }

        Ok(batch
            .iter()
            .cloned()
            .zip(embeddings.into_iter().map(|mut v| {
                l2_normalize(&mut v);
                v
            }))
            .collect())
    }

    /// Run a blocking index call on the blocking pool.
    async fn with_index<T, F>(&self, op: F) -> AppResult<T>
    where
        F: FnOnce(&dyn VectorIndex) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let index = Arc::clone(&self.index);
        tokio::task::spawn_blocking(move || op(index.as_ref()))
            .await
            .map_err(|e| AppError::Knowledge(format!("Index task failed: {}", e)))?
    }

    fn to_passage(&self, doc: Document) -> Passage {
        Passage {
            id: doc.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            text: doc.text,
            sku: doc.sku,
            source: doc.source,
            lang: doc.lang.unwrap_or_else(|| self.default_lang.clone()),
            valid_from: doc.valid_from,
            valid_to: doc.valid_to,
            version: doc.version,
            section_id: doc.section_id,
            tags: doc.tags,
        }
    }

    /// Get statistics about the index.
    pub fn stats(&self) -> AppResult<IndexStats> {
        self.index.stats()
    }

    /// Flush pending index writes and release the retriever.
    pub fn close(self) -> AppResult<()> {
        self.index.flush()?;
        tracing::debug!("Retriever closed");
        Ok(())
    }
}

#[async_trait::async_trait]
impl PassageSearch for Retriever {
    async fn search(
        &self,
        query: &str,
        filter: &MetadataFilter,
        top_k: usize,
    ) -> AppResult<Vec<RetrievedPassage>> {
        let mut query_vec = self
            .embedder
            .embed(&EmbeddingRole::Query.encode(query))
            .await?;
        l2_normalize(&mut query_vec);

        let filter = filter.clone();
        let mut results = self
            .with_index(move |index| index.search(&query_vec, &filter, top_k))
            .await?;

        if let Some(min_score) = self.min_score {
            results.retain(|r| r.score >= min_score);
        }

        if let Some(top) = results.first() {
            tracing::debug!(
                "Retrieved {} passages (top score: {:.3})",
                results.len(),
                top.score
            );
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use std::sync::Mutex;

    /// Records every input it embeds and returns a constant unnormalized vector.
    #[derive(Debug, Default)]
    struct RecordingProvider {
        seen: Mutex<Vec<String>>,
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for RecordingProvider {
        fn provider_name(&self) -> &str {
            "recording"
        }

        fn model_name(&self) -> &str {
            "recording"
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            self.seen.lock().unwrap().extend(texts.iter().cloned());
            self.batches.lock().unwrap().push(texts.len());
            Ok(texts.iter().map(|_| vec![3.0, 4.0]).collect())
        }
    }

    fn config(batch_size: usize) -> RetrievalConfig {
        RetrievalConfig {
            batch_size,
            ..RetrievalConfig::default()
        }
    }

    fn trigram_retriever() -> Retriever {
        Retriever::new(
            Arc::new(TrigramProvider::new(384)),
            Arc::new(SqliteIndex::in_memory(384).unwrap()),
            &config(64),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_ingest_uses_passage_prefix_and_query_uses_query_prefix() {
        let provider = Arc::new(RecordingProvider::default());
        let retriever = Retriever::new(
            provider.clone(),
            Arc::new(SqliteIndex::in_memory(2).unwrap()),
            &config(64),
        )
        .unwrap();

        retriever.ingest(vec![Document::new("ficha")]).await.unwrap();
        let hits = retriever
            .search("ficha", &MetadataFilter::new(), 3)
            .await
            .unwrap();

        let seen = provider.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["passage: ficha", "query: ficha"]);

        // Stored and query vectors are normalized, so identical inputs score 1.0
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_ingest_batches_and_skips_blank_text() {
        let provider = Arc::new(RecordingProvider::default());
        let retriever = Retriever::new(
            provider.clone(),
            Arc::new(SqliteIndex::in_memory(2).unwrap()),
            &config(2),
        )
        .unwrap();

        let docs = vec![
            Document::new("a"),
            Document::new("   "),
            Document::new("b"),
            Document::new("c"),
            Document::new(""),
        ];
        let written = retriever.ingest(docs).await.unwrap();

        assert_eq!(written, 3);
        assert_eq!(*provider.batches.lock().unwrap(), vec![2, 1]);
        assert_eq!(retriever.stats().unwrap().passages, 3);
    }

    #[tokio::test]
    async fn test_ingest_defaults_id_and_lang() {
        let retriever = trigram_retriever();
        retriever
            .ingest(vec![Document::new("Router de doble banda").with_sku("SKU-001")])
            .await
            .unwrap();

        let hits = retriever
            .search("router", &MetadataFilter::sku("SKU-001"), 1)
            .await
            .unwrap();
        assert_eq!(hits[0].passage.lang, "es");
        assert!(uuid::Uuid::parse_str(&hits[0].passage.id).is_ok());
    }

    #[tokio::test]
    async fn test_reingest_same_id_overwrites() {
        let retriever = trigram_retriever();
        retriever
            .ingest(vec![Document::new("version uno").with_id("doc-1")])
            .await
            .unwrap();
        retriever
            .ingest(vec![Document::new("version dos").with_id("doc-1")])
            .await
            .unwrap();

        assert_eq!(retriever.stats().unwrap().passages, 1);
    }

    #[tokio::test]
    async fn test_replace_swaps_index_contents() {
        let retriever = trigram_retriever();
        retriever
            .ingest(vec![
                Document::new("version uno").with_id("old-1"),
                Document::new("version dos").with_id("old-2"),
            ])
            .await
            .unwrap();

        let written = retriever
            .replace(vec![Document::new("ficha nueva").with_id("new-1")])
            .await
            .unwrap();

        assert_eq!(written, 1);
        let hits = retriever
            .search("ficha nueva", &MetadataFilter::new(), 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].passage.id, "new-1");
    }

    #[tokio::test]
    async fn test_min_score_cutoff() {
        let retriever = Retriever::new(
            Arc::new(TrigramProvider::new(384)),
            Arc::new(SqliteIndex::in_memory(384).unwrap()),
            &RetrievalConfig {
                min_score: Some(0.99),
                ..RetrievalConfig::default()
            },
        )
        .unwrap();
        retriever
            .ingest(vec![Document::new("garantía de doce meses")])
            .await
            .unwrap();

        let hits = retriever
            .search("factura vencida", &MetadataFilter::new(), 3)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected_at_construction() {
        let result = Retriever::new(
            Arc::new(TrigramProvider::new(384)),
            Arc::new(SqliteIndex::in_memory(768).unwrap()),
            &config(64),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unavailable_search_reports_reason() {
        let search = UnavailableSearch::new("index locked");
        let err = search
            .search("x", &MetadataFilter::new(), 3)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("index locked"));
    }

    #[tokio::test]
    async fn test_connect_and_close() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = RetrievalConfig {
            index_path: dir.path().join("rag.sqlite"),
            ..RetrievalConfig::default()
        };

        let retriever = Retriever::connect(&config).await.unwrap();
        retriever.ingest(vec![Document::new("hola")]).await.unwrap();
        retriever.close().unwrap();

        let reopened = Retriever::connect(&config).await.unwrap();
        assert_eq!(reopened.stats().unwrap().passages, 1);
    }
}
