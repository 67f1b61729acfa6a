use serde::{Deserialize, Serialize};

use crate::document::DocumentRecord;
use crate::services::workspace::TranscriptEntry;

// ===== REQUEST MODELS =====

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

// ===== RESPONSE EVENT MODELS =====

#[derive(Debug, Serialize)]
pub struct MessageChunk {
    pub delta: String, // streaming text chunk
}

#[derive(Debug, Serialize)]
pub struct CompletionInfo {
    pub session_id: String,
    pub message_id: String,
    pub processing_time_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

// ===== DOCUMENT MODELS =====

#[derive(Debug, Serialize)]
pub struct DocumentSummary {
    pub name: String,
    pub source_type: String,
    pub size_bytes: u64,
    pub char_count: usize,
}

impl From<&DocumentRecord> for DocumentSummary {
    fn from(doc: &DocumentRecord) -> Self {
        Self {
            name: doc.name.clone(),
            source_type: doc.source_type.clone(),
            size_bytes: doc.size_bytes,
            char_count: doc.content.chars().count(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentSummary>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    /// Documents extracted from this request.
    pub processed: Vec<DocumentSummary>,
    /// Active set after the change.
    pub active_documents: usize,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub messages: Vec<TranscriptEntry>,
}
