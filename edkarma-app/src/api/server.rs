use axum::{routing::get, Router};
use std::collections::BTreeMap;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::api::routes::{get_scores, put_scores, summary, AppState};
use edkarma_core::ScoreRepository;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/scores", get(get_scores).put(put_scores))
        .route("/summary", get(summary))
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

pub async fn run(
    repo: Arc<dyn ScoreRepository>,
    api_keys: BTreeMap<String, String>,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, users = api_keys.len(), "karma server listening");
    serve(listener, AppState { repo, api_keys }).await
}

/// Serves on an already bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}
