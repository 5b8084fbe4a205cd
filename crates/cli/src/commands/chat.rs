//! Chat command handler.
//!
//! Runs one request through the full engine and prints the response JSON.

use clap::Args;
use grounded_core::{AppConfig, AppResult};
use grounded_engine::{ChatRequest, Engine};

/// Answer a single message
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Customer message
    #[arg(default_value = "")]
    pub message: String,

    /// Explicit order id
    #[arg(long)]
    pub order_id: Option<i64>,

    /// Explicit SKU
    #[arg(long)]
    pub sku: Option<String>,

    /// Reply language code
    #[arg(long)]
    pub lang: Option<String>,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let request = ChatRequest {
            message: self.message.clone(),
            order_id: self.order_id,
            sku: self.sku.clone(),
            lang: self.lang.clone(),
        };

        let (retriever, search) = super::connect_search(config).await;
        let engine = Engine::from_config(config, search)?;

        let response = engine.handle(&request).await;
        println!("{}", serde_json::to_string_pretty(&response)?);

        drop(engine);
        super::close_retriever(retriever)
    }
}
