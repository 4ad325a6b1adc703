use tracing_subscriber::EnvFilter;

use wellness_search::api;
use wellness_search::config::Config;
use wellness_search::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(
        "Embeddings backend: {} ({})",
        config.store.backend,
        config.store.base_url
    );
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);
    tracing::info!(
        threshold = config.agent.match_threshold,
        match_count = config.agent.match_count,
        "Agent search tuning"
    );

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config)?;
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
