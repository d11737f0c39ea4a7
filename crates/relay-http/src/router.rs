use std::sync::Arc;

use axum::{routing::get, Router};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use relay_core::{config::Config, service::ChannelService};

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub service: Arc<ChannelService>,
}

impl AppState {
    pub fn new(cfg: Arc<Config>, service: Arc<ChannelService>) -> Self {
        Self { cfg, service }
    }
}

/// Channel routes: `GET /health`, `GET /`, `POST /`.
///
/// CORS is wide open; browser front-ends call channels cross-origin.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/",
            get(handlers::list_messages).post(handlers::submit_message),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the configured address and serve until `shutdown` is cancelled.
pub async fn serve(state: AppState, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = state.cfg.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        channel = %state.cfg.channel_name,
        "listening on http://{}",
        listener.local_addr()?
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("server stopped");
    Ok(())
}
