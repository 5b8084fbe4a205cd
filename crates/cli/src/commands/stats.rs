//! Stats command handler.
//!
//! Shows retrieval index statistics.

use clap::Args;
use grounded_core::{AppConfig, AppResult};
use grounded_knowledge::Retriever;

/// Show retrieval index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::debug!("Stats options: {:?}", self);

        let retriever = Retriever::connect(&config.retrieval).await?;
        let stats = retriever.stats()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("Index: {}", config.retrieval.index_path.display());
            println!("Passages: {}", stats.passages);
            println!("Stale passages: {}", stats.stale_passages);
        }

        retriever.close()
    }
}
