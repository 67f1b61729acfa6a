pub mod chat;
pub mod documents;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// API routes. CORS and tracing layers are added by the binary.
pub fn router(state: AppState) -> Router {
    let max_body_bytes = state.settings.upload.max_body_bytes;

    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/api/documents",
            get(documents::list_documents_handler)
                .post(documents::load_documents_handler)
                .delete(documents::clear_documents_handler),
        )
        .route("/api/documents/add", post(documents::add_documents_handler))
        .route("/api/messages", get(chat::list_messages_handler))
        .route("/api/chat/stream", post(chat::chat_stream_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}
