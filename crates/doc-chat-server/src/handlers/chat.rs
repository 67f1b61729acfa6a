use crate::models::chat::*;
use crate::services::workspace::ChatEvent;
use crate::services::ChatWorkspace;
use crate::utils::error::ApiError;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub async fn chat_stream_handler(
    State(workspace): State<Arc<ChatWorkspace>>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let start_time = Instant::now();

    info!("Chat request: message_len={}", request.message.len());

    let mut events = workspace.send_message(&request.message)?;

    let stream = async_stream::stream! {
        while let Some(event) = events.next().await {
            match event {
                ChatEvent::Delta(delta) => {
                    yield Ok(create_sse_event("message", &MessageChunk { delta }));
                }
                ChatEvent::Failed { message, .. } => {
                    warn!("Streaming error: {}", message);
                    yield Ok(create_sse_event("error", &ErrorInfo {
                        code: "LLM_STREAM_ERROR".to_string(),
                        message,
                    }));
                    return;
                }
                ChatEvent::Done { message_id, session_id } => {
                    let processing_time = start_time.elapsed().as_millis() as u64;

                    yield Ok(create_sse_event("done", &CompletionInfo {
                        session_id: session_id.to_string(),
                        message_id: message_id.to_string(),
                        processing_time_ms: processing_time,
                    }));

                    info!("Chat completed in {}ms", processing_time);
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub async fn list_messages_handler(
    State(workspace): State<Arc<ChatWorkspace>>,
) -> Json<TranscriptResponse> {
    Json(TranscriptResponse {
        messages: workspace.transcript(),
    })
}

// Helper: Create SSE event
fn create_sse_event<T: serde::Serialize>(event_type: &str, data: &T) -> Event {
    Event::default()
        .event(event_type)
        .data(serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string()))
}
