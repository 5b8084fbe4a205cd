//! HTTP surface for the grounded answering engine.

pub mod routes;

use axum::Router;
use grounded_core::{AppConfig, AppError, AppResult};
use grounded_engine::Engine;
use grounded_knowledge::Retriever;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared by every handler.
pub struct AppState {
    pub engine: Arc<Engine>,
    /// `None` when the retriever failed to connect at startup
    pub retriever: Option<Arc<Retriever>>,
    pub admin_token: String,
    /// Upper bound on a `/chat` request
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, retriever: Option<Arc<Retriever>>, config: &AppConfig) -> Self {
        // Order chain (two sequential calls) plus drafting, with headroom
        let request_timeout =
            config.backends.timeout() * 2 + config.drafting.timeout() + Duration::from_secs(5);

        Self {
            engine,
            retriever,
            admin_token: config.server.admin_token.clone(),
            request_timeout,
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let request_timeout = state.request_timeout;

    // Admin ingestion can legitimately run long, so only chat is bounded
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::chat_routes().layer(TimeoutLayer::new(request_timeout)))
        .merge(routes::admin_routes())
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}

/// Serve until the process receives Ctrl-C.
pub async fn run(state: AppState, bind: &str) -> AppResult<()> {
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Other(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
