//! Command handlers for the grounded CLI.
//!
//! Each subcommand lives in its own module; the helpers here own the
//! retriever lifecycle shared by several of them.

pub mod chat;
pub mod ingest;
pub mod seed;
pub mod serve;
pub mod stats;

pub use chat::ChatCommand;
pub use ingest::IngestCommand;
pub use seed::SeedDemoCommand;
pub use serve::ServeCommand;
pub use stats::StatsCommand;

use grounded_core::{AppConfig, AppError, AppResult};
use grounded_knowledge::{PassageSearch, Retriever, UnavailableSearch};
use std::sync::Arc;

/// Connect the retriever for request serving.
///
/// A connection failure is not fatal: requests that need retrieval get a
/// search handle that reports the failure as a retrieval error.
pub async fn connect_search(config: &AppConfig) -> (Option<Arc<Retriever>>, Arc<dyn PassageSearch>) {
    match Retriever::connect(&config.retrieval).await {
        Ok(retriever) => {
            let retriever = Arc::new(retriever);
            (Some(retriever.clone()), retriever)
        }
        Err(e) => {
            tracing::warn!("Retrieval unavailable, continuing without it: {}", e);
            (None, Arc::new(UnavailableSearch::new(e.to_string())))
        }
    }
}

/// Flush and release a shared retriever once every other handle is gone.
pub fn close_retriever(retriever: Option<Arc<Retriever>>) -> AppResult<()> {
    let Some(retriever) = retriever else {
        return Ok(());
    };
    match Arc::try_unwrap(retriever) {
        Ok(retriever) => retriever.close(),
        Err(_) => Err(AppError::Other(
            "Retriever still in use at shutdown".to_string(),
        )),
    }
}
