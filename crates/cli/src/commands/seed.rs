//! Seed-demo command handler.

use clap::Args;
use grounded_core::{AppConfig, AppResult};
use grounded_knowledge::{demo_documents, Retriever};

/// Index the two demonstration spec sheets
#[derive(Args, Debug)]
pub struct SeedDemoCommand {}

impl SeedDemoCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let retriever = Retriever::connect(&config.retrieval).await?;
        let ingested = retriever.ingest(demo_documents()).await?;

        println!(
            "Seeded {} demo passages into {}",
            ingested,
            config.retrieval.index_path.display()
        );
        retriever.close()
    }
}
