use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::info;

use doc_chat_server::config::Settings;
use doc_chat_server::handlers;
use doc_chat_server::services::{ChatWorkspace, GeminiService, SessionManager};
use doc_chat_server::state::AppState;
use doc_chat_server::utils::init_logger;

#[tokio::main]
async fn main() -> Result<()> {
    init_logger()?;

    info!("🚀 Starting doc chat server...");

    // Fails fast when no API key can be resolved
    let settings = Settings::load()?;
    info!(
        model = %settings.gemini.model,
        temperature = settings.session.temperature,
        "✅ Configuration loaded"
    );

    let provider = Arc::new(GeminiService::new(settings.gemini.clone()));
    let sessions = SessionManager::new(provider, &settings.session);
    let workspace = ChatWorkspace::new(sessions);

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    let app = build_router(AppState::new(workspace, settings));

    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn build_router(state: AppState) -> Router {
    handlers::router(state)
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // Tracing
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
