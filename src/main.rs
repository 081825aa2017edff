use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tower::ServiceBuilder;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
use tracing_subscriber::{fmt, EnvFilter};

use vastra_stylist::{
    composer::{MockComposer, StyleComposer},
    config::{ComposerMode, Config},
    gemini::{GeminiClient, GeminiComposer},
    routes::{self, AppState},
};

fn build_composer(config: &Config) -> Arc<dyn StyleComposer> {
    match (config.composer_mode, &config.gemini_api_key) {
        (ComposerMode::Generative, Some(key)) => {
            tracing::info!("Using API key: {}...", key.chars().take(10).collect::<String>());
            let client = GeminiClient::new(key.clone(), config.gemini_api_base.clone(), config.gemini_model.clone());
            Arc::new(GeminiComposer::new(client))
        }
        _ => {
            tracing::info!("Using static mode - suggestions are composed locally");
            Arc::new(MockComposer::new())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let state = AppState::new(build_composer(&config));
    tokio::spawn(routes::sweep_idle_sessions(state.clone()));

    let app = routes::router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, composer = ?config.composer_mode, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
