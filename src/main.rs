use std::env;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use authorai_backend::core::logging;
use authorai_backend::server;
use authorai_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state = AppState::initialize().await?;
    logging::init(&state.paths);

    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(state.config.server.port);
    let bind_addr = format!("127.0.0.1:{}", port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    println!("AUTHORAI_PORT={}", addr.port());
    tracing::info!("Listening on {}", addr);
    tracing::info!("Knowledge base loaded with {} chunks", state.knowledge.len());

    let app: Router = server::router::router(state.clone());

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
