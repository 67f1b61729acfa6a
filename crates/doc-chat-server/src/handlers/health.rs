use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::services::ChatWorkspace;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    session_ready: bool,
    documents: usize,
}

pub async fn health_check(
    State(workspace): State<Arc<ChatWorkspace>>,
) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            session_ready: workspace.sessions().is_initialized(),
            documents: workspace.documents().len(),
        }),
    )
}
