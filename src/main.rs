use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use ragsearch_backend::core::logging;
use ragsearch_backend::server;
use ragsearch_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state = AppState::initialize()
        .await
        .map_err(|e| anyhow::anyhow!("initialization failed: {e}"))?;
    logging::init(&state.paths);

    if state.settings.scheduler.enabled && state.settings.scheduler.autostart {
        state.scheduler.start().await;
    }

    let bind_addr = format!(
        "{}:{}",
        state.settings.server.host, state.settings.server.port
    );
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state.clone());

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
