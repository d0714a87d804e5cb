mod config;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use greenroom_core::{
    coach::OpenAiCoach, engine::InterviewEngine, store::InMemorySessionStore,
    transcribe::OpenAiTranscriber,
};

use crate::config::Config;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(config.log_level.into())
                .from_env_lossy(),
        )
        .init();

    let engine = InterviewEngine::new(
        InMemorySessionStore::new(),
        OpenAiCoach::new(config.openai_api_key.clone(), config.chat_model.clone()),
        OpenAiTranscriber::new(config.openai_api_key.clone(), config.transcribe_model.clone()),
    );
    let state = AppState {
        engine: Arc::new(engine),
    };

    // Permissive CORS so a separate frontend can reach the API during
    // development.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state).layer(cors);

    info!("Starting interview API server, listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
