//! Serve command handler.

use clap::Args;
use grounded_core::{AppConfig, AppResult};
use grounded_engine::Engine;
use grounded_server::AppState;
use std::sync::Arc;

/// Run the HTTP service
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to listen on (overrides server.bind)
    #[arg(long, env = "GROUNDED_BIND")]
    pub bind: Option<String>,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let (retriever, search) = super::connect_search(config).await;
        let engine = Engine::from_config(config, search)?;

        let state = AppState::new(Arc::new(engine), retriever.clone(), config);
        grounded_server::run(state, &config.server.bind).await?;

        super::close_retriever(retriever)
    }
}
