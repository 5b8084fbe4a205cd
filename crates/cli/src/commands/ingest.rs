//! Ingest command handler.
//!
//! Loads a front-matter corpus directory into the retrieval index.

use clap::Args;
use grounded_core::{AppConfig, AppResult};
use grounded_knowledge::{load_corpus, Retriever};
use std::path::PathBuf;

/// Ingest a corpus of .md/.txt files into the retrieval index
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Corpus directory
    #[arg(long, default_value = "./data/rag_corpus")]
    pub path: PathBuf,

    /// Only ingest files whose path contains this substring
    #[arg(long)]
    pub include: Option<String>,

    /// Replace every indexed passage with the corpus
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Ingesting corpus from {:?}", self.path);

        let retriever = Retriever::connect(&config.retrieval).await?;
        let result = self.ingest_into(&retriever).await;
        retriever.close()?;
        let (ingested, files) = result?;

        if self.json {
            let output = serde_json::json!({ "ingested": ingested, "files": files });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Ingested {} passages from {} files", ingested, files.len());
            for file in &files {
                println!("  {}", file);
            }
        }
        Ok(())
    }

    /// The corpus is read before the index is touched; with `--reset` the
    /// old contents are swapped out in one transaction.
    async fn ingest_into(&self, retriever: &Retriever) -> AppResult<(usize, Vec<String>)> {
        let corpus = load_corpus(&self.path, self.include.as_deref())?;
        let files: Vec<String> = corpus
            .files
            .iter()
            .map(|f| f.display().to_string())
            .collect();

        let ingested = if self.reset {
            tracing::info!("Replacing retrieval index contents");
            retriever.replace(corpus.documents).await?
        } else {
            retriever.ingest(corpus.documents).await?
        };

        Ok((ingested, files))
    }
}
