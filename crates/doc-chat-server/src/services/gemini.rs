use crate::config::{is_usable_key, GeminiConfig};
use crate::services::conversation::{ChatProvider, ChatRequest, TextStream};
use crate::utils::error::SessionError;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Streaming client for the Gemini `streamGenerateContent` endpoint.
#[derive(Clone)]
pub struct GeminiService {
    client: Client,
    config: GeminiConfig,
}

// Request structures
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: SystemInstruction<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

// Response structures
#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl GeminiService {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .read_timeout(Duration::from_secs(config.timeout_seconds))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_body(request: &ChatRequest) -> GenerateContentRequest<'_> {
        let mut contents: Vec<Content<'_>> = request
            .history
            .iter()
            .map(|turn| Content {
                role: turn.role.as_str(),
                parts: vec![RequestPart { text: &turn.text }],
            })
            .collect();

        contents.push(Content {
            role: "user",
            parts: vec![RequestPart {
                text: &request.message,
            }],
        });

        GenerateContentRequest {
            system_instruction: SystemInstruction {
                parts: vec![RequestPart {
                    text: &request.system_instruction,
                }],
            },
            contents,
            generation_config: GenerationConfig {
                temperature: request.temperature,
            },
        }
    }
}

#[async_trait::async_trait]
impl ChatProvider for GeminiService {
    fn validate(&self) -> Result<(), SessionError> {
        if is_usable_key(&self.config.api_key) {
            Ok(())
        } else {
            Err(SessionError::Configuration(
                "API key is missing. Set GEMINI_API_KEY in your environment.".to_string(),
            ))
        }
    }

    async fn stream_chat(&self, request: ChatRequest) -> Result<TextStream, SessionError> {
        debug!(
            model = %self.config.model,
            history = request.history.len(),
            "Starting Gemini stream"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.config.api_key.trim())
            .json(&Self::build_body(&request))
            .send()
            .await
            .map_err(|e| SessionError::RemoteStream(format!("Gemini network error: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Gemini API error ({}): {}", status, body);
            return Err(SessionError::RemoteStream(error_message(status, &body)));
        }

        let mut bytes = Box::pin(response.bytes_stream());

        let stream = async_stream::stream! {
            let mut buffer = SseLineBuffer::default();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(SessionError::RemoteStream(format!("Gemini stream error: {}", e)));
                        return;
                    }
                };

                for line in buffer.push(&chunk) {
                    match parse_event_line(&line) {
                        Ok(Some(text)) => yield Ok(text),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }

            if let Some(line) = buffer.finish() {
                match parse_event_line(&line) {
                    Ok(Some(text)) => yield Ok(text),
                    Ok(None) => {}
                    Err(e) => yield Err(e),
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("Gemini API error ({}): {}", status, body.trim()))
}

/// Reassembles SSE lines split across network chunks.
#[derive(Default)]
pub(crate) struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    /// Append raw bytes and drain every complete line.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Whatever is left once the body ends without a trailing newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string();
        Some(line)
    }
}

/// Text carried by one SSE line, `None` for anything that is not a
/// non-empty `data:` payload.
pub(crate) fn parse_event_line(line: &str) -> Result<Option<String>, SessionError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| SessionError::RemoteStream(format!("Malformed Gemini stream event: {}", e)))?;

    if let Some(err) = chunk.error {
        return Err(SessionError::RemoteStream(err.message));
    }

    let text: String = chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|part| !part.thought)
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    Ok((!text.is_empty()).then_some(text))
}
