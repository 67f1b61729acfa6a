use crate::document::UploadedFile;
use crate::models::chat::{DocumentListResponse, DocumentSummary, UploadResponse};
use crate::services::ChatWorkspace;
use crate::state::AppState;
use crate::utils::error::ApiError;
use axum::{
    extract::{Multipart, State},
    Json,
};
use std::sync::Arc;
use tracing::{debug, info};

pub async fn list_documents_handler(
    State(workspace): State<Arc<ChatWorkspace>>,
) -> Json<DocumentListResponse> {
    let documents = workspace.documents().iter().map(DocumentSummary::from).collect();
    Json(DocumentListResponse { documents })
}

/// Replace the active set with the uploaded files.
pub async fn load_documents_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let files = read_uploads(multipart, state.settings.upload.max_files).await?;
    info!("Load request with {} file(s)", files.len());

    let workspace = state.workspace.clone();
    let processed = tokio::task::spawn_blocking(move || workspace.load_documents(&files))
        .await
        .map_err(|e| ApiError::InternalError(format!("Extraction task failed: {}", e)))??;

    Ok(Json(upload_response(&state.workspace, &processed, "loaded")))
}

/// Append the uploaded files to the active set, keeping the conversation.
pub async fn add_documents_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let files = read_uploads(multipart, state.settings.upload.max_files).await?;
    info!("Add request with {} file(s)", files.len());

    let workspace = state.workspace.clone();
    let processed = tokio::task::spawn_blocking(move || workspace.add_documents(&files))
        .await
        .map_err(|e| ApiError::InternalError(format!("Extraction task failed: {}", e)))??;

    Ok(Json(upload_response(&state.workspace, &processed, "added")))
}

pub async fn clear_documents_handler(
    State(workspace): State<Arc<ChatWorkspace>>,
) -> Result<Json<UploadResponse>, ApiError> {
    workspace.clear_documents()?;

    Ok(Json(UploadResponse {
        success: true,
        message: "All documents removed".to_string(),
        processed: Vec::new(),
        active_documents: 0,
    }))
}

fn upload_response(
    workspace: &ChatWorkspace,
    processed: &[crate::document::DocumentRecord],
    verb: &str,
) -> UploadResponse {
    UploadResponse {
        success: true,
        message: format!("{} document(s) {}", processed.len(), verb),
        processed: processed.iter().map(DocumentSummary::from).collect(),
        active_documents: workspace.documents().len(),
    }
}

/// Collect every `file` / `files` field of the form, in order.
async fn read_uploads(mut multipart: Multipart, max_files: usize) -> Result<Vec<UploadedFile>, ApiError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read field: {}", e)))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        if field_name != "file" && field_name != "files" {
            debug!("Ignoring form field {:?}", field_name);
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| ApiError::BadRequest("filename required".to_string()))?;
        let content_type = field.content_type().map(|s| s.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;

        files.push(UploadedFile::new(filename, content_type.as_deref(), data));

        if files.len() > max_files {
            return Err(ApiError::BadRequest(format!(
                "Too many files, at most {} per request",
                max_files
            )));
        }
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest("file required".to_string()));
    }

    Ok(files)
}
