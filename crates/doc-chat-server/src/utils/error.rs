use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Per-file extraction failure. Any one of these aborts the whole batch.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Error with {file_name}: {reason}")]
    UnsupportedFormat { file_name: String, reason: String },

    #[error("Error with {file_name}: No readable text found in this file.")]
    EmptyExtraction { file_name: String },

    #[error("Error with {file_name}: {cause:#}")]
    ExtractionFailure {
        file_name: String,
        cause: anyhow::Error,
    },
}

impl ExtractionError {
    pub fn file_name(&self) -> &str {
        match self {
            Self::UnsupportedFormat { file_name, .. }
            | Self::EmptyExtraction { file_name }
            | Self::ExtractionFailure { file_name, .. } => file_name,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not initialized.")]
    NotInitialized,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    RemoteStream(String),
}

/// Failures of the load / add / clear / send flows.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("No readable text could be extracted from these files.")]
    NothingExtracted,

    #[error("Message must not be empty.")]
    EmptyMessage,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<WorkspaceError> for ApiError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::Extraction(e) => ApiError::Extraction(e),
            WorkspaceError::Session(e) => ApiError::Session(e),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error_type) = match &self {
            ApiError::BadRequest(_) => {
                tracing::warn!("Bad request: {}", message);
                (StatusCode::BAD_REQUEST, "BadRequest")
            }
            ApiError::Extraction(e) => {
                tracing::warn!(file = %e.file_name(), "Extraction failed: {}", message);
                (StatusCode::UNPROCESSABLE_ENTITY, "ExtractionError")
            }
            ApiError::Session(SessionError::NotInitialized) => {
                tracing::warn!("Chat requested before any session: {}", message);
                (StatusCode::CONFLICT, "SessionNotInitialized")
            }
            ApiError::Session(SessionError::Configuration(_)) => {
                tracing::error!("{}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, "ConfigurationError")
            }
            ApiError::Session(SessionError::RemoteStream(_)) => {
                tracing::error!("LLM error: {}", message);
                (StatusCode::SERVICE_UNAVAILABLE, "LlmError")
            }
            ApiError::InternalError(_) => {
                tracing::error!("{}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_error_names_file() {
        let err = ExtractionError::EmptyExtraction {
            file_name: "notes.txt".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Error with notes.txt: No readable text found in this file."
        );
        assert_eq!(err.file_name(), "notes.txt");
    }

    #[test]
    fn test_extraction_failure_keeps_context_chain() {
        let cause = anyhow::anyhow!("invalid zip header").context("Failed to open PPTX archive");
        let err = ExtractionError::ExtractionFailure {
            file_name: "deck.pptx".to_string(),
            cause,
        };
        let text = err.to_string();
        assert!(text.starts_with("Error with deck.pptx: Failed to open PPTX archive"));
        assert!(text.contains("invalid zip header"));
    }

    #[test]
    fn test_workspace_errors_keep_their_message() {
        let api = ApiError::from(WorkspaceError::NothingExtracted);
        assert_eq!(
            api.to_string(),
            "Bad request: No readable text could be extracted from these files."
        );
    }

    #[test]
    fn test_status_mapping() {
        let resp = ApiError::from(SessionError::NotInitialized).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = ApiError::from(ExtractionError::UnsupportedFormat {
            file_name: "a.exe".to_string(),
            reason: "The file extension .exe is not supported yet.".to_string(),
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let resp = ApiError::BadRequest("empty".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = ApiError::from(WorkspaceError::Session(SessionError::RemoteStream(
            "quota".to_string(),
        )))
        .into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
