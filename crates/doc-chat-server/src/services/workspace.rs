use chrono::{DateTime, Utc};
use futures::stream::Stream;
use parking_lot::Mutex;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::document::{DocumentExtractor, DocumentRecord, UploadedFile};
use crate::services::conversation::{ConversationTurn, Role, SessionManager};
use crate::utils::error::WorkspaceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Message,
    Welcome,
    Notice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Complete,
    Streaming,
    Failed,
}

/// One line of the visible conversation.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub kind: EntryKind,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TranscriptEntry {
    fn new(role: Role, text: String, kind: EntryKind, status: EntryStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text,
            kind,
            status,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Only finished, non-empty conversation messages are replayed to a new session.
    fn is_replayable(&self) -> bool {
        self.kind == EntryKind::Message
            && self.status == EntryStatus::Complete
            && !self.text.trim().is_empty()
    }
}

/// Progress of one streamed reply as seen by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Delta(String),
    Done { message_id: Uuid, session_id: Uuid },
    Failed { message_id: Uuid, message: String },
}

pub type ChatEventStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;

#[derive(Default)]
struct WorkspaceState {
    documents: Vec<DocumentRecord>,
    transcript: Vec<TranscriptEntry>,
}

/// Active document set plus transcript, kept in step with the chat session.
///
/// Every change to the document set rebuilds the session. Extraction or
/// session failures leave the previous state untouched.
pub struct ChatWorkspace {
    sessions: SessionManager,
    state: Mutex<WorkspaceState>,
}

impl ChatWorkspace {
    pub fn new(sessions: SessionManager) -> Self {
        Self {
            sessions,
            state: Mutex::new(WorkspaceState::default()),
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn documents(&self) -> Vec<DocumentRecord> {
        self.state.lock().documents.clone()
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.state.lock().transcript.clone()
    }

    /// Replace the document set and start a fresh conversation.
    ///
    /// Blocking: runs the extractors on the calling thread.
    #[instrument(skip_all, fields(files = files.len()))]
    pub fn load_documents(&self, files: &[UploadedFile]) -> Result<Vec<DocumentRecord>, WorkspaceError> {
        let documents = DocumentExtractor::extract(files)?;
        if documents.is_empty() {
            return Err(WorkspaceError::NothingExtracted);
        }

        self.sessions.initialize_session(&documents, None)?;

        let welcome = format!(
            "I've successfully loaded {} document(s): {}. How can I assist you with them today?",
            documents.len(),
            bold_names(&documents)
        );

        let mut state = self.state.lock();
        state.documents = documents.clone();
        state.transcript = vec![TranscriptEntry::new(
            Role::Model,
            welcome,
            EntryKind::Welcome,
            EntryStatus::Complete,
        )];

        info!("Loaded {} document(s)", documents.len());
        Ok(documents)
    }

    /// Append documents while keeping the conversation so far.
    ///
    /// Falls back to `load_documents` when nothing is loaded yet. Blocking.
    #[instrument(skip_all, fields(files = files.len()))]
    pub fn add_documents(&self, files: &[UploadedFile]) -> Result<Vec<DocumentRecord>, WorkspaceError> {
        let current = self.documents();
        if current.is_empty() {
            return self.load_documents(files);
        }

        let added = DocumentExtractor::extract(files)?;
        if added.is_empty() {
            return Ok(added);
        }

        let mut combined = current;
        combined.extend(added.iter().cloned());

        self.sessions
            .initialize_session(&combined, Some(self.sanitized_history()))?;

        let notice = format!(
            "Added {} more document(s): {}. Context updated.",
            added.len(),
            bold_names(&added)
        );

        let mut state = self.state.lock();
        state.documents = combined;
        state.transcript.push(TranscriptEntry::new(
            Role::Model,
            notice,
            EntryKind::Notice,
            EntryStatus::Complete,
        ));

        info!(
            "Added {} document(s), {} active",
            added.len(),
            state.documents.len()
        );
        Ok(added)
    }

    pub fn clear_documents(&self) -> Result<(), WorkspaceError> {
        self.sessions.initialize_session(&[], None)?;

        {
            let mut state = self.state.lock();
            state.documents.clear();
            state.transcript.clear();
        }
        info!("Cleared all documents");
        Ok(())
    }

    /// Turns replayed into a rebuilt session.
    pub fn sanitized_history(&self) -> Vec<ConversationTurn> {
        self.state
            .lock()
            .transcript
            .iter()
            .filter(|entry| entry.is_replayable())
            .map(|entry| ConversationTurn {
                role: entry.role,
                text: entry.text.clone(),
                created_at: entry.created_at,
            })
            .collect()
    }

    /// Record the user message and stream the reply into the transcript.
    pub fn send_message(self: Arc<Self>, text: &str) -> Result<ChatEventStream, WorkspaceError> {
        if text.trim().is_empty() {
            return Err(WorkspaceError::EmptyMessage);
        }

        let mut messages = self.sessions.send_message(text)?;
        let session_id = messages.session_id();

        let reply = TranscriptEntry::new(
            Role::Model,
            String::new(),
            EntryKind::Message,
            EntryStatus::Streaming,
        );
        let message_id = reply.id;
        {
            let mut state = self.state.lock();
            state.transcript.push(TranscriptEntry::new(
                Role::User,
                text.to_string(),
                EntryKind::Message,
                EntryStatus::Complete,
            ));
            state.transcript.push(reply);
        }

        let workspace = self;
        let stream = async_stream::stream! {
            while let Some(item) = messages.next_chunk().await {
                match item {
                    Ok(delta) => {
                        workspace.update_entry(message_id, |entry| entry.text.push_str(&delta));
                        yield ChatEvent::Delta(delta);
                    }
                    Err(e) => {
                        let message = e.to_string();
                        warn!(%message_id, "Reply failed: {}", message);
                        workspace.update_entry(message_id, |entry| {
                            entry.status = EntryStatus::Failed;
                            entry.error = Some(message.clone());
                        });
                        yield ChatEvent::Failed { message_id, message };
                        return;
                    }
                }
            }

            workspace.update_entry(message_id, |entry| entry.status = EntryStatus::Complete);
            yield ChatEvent::Done { message_id, session_id };
        };

        Ok(Box::pin(stream))
    }

    // no-op when the entry was dropped by a reload in the meantime
    fn update_entry(&self, id: Uuid, f: impl FnOnce(&mut TranscriptEntry)) {
        let mut state = self.state.lock();
        if let Some(entry) = state.transcript.iter_mut().find(|e| e.id == id) {
            f(entry);
        }
    }
}

fn bold_names(documents: &[DocumentRecord]) -> String {
    documents
        .iter()
        .map(|d| format!("**{}**", d.name))
        .collect::<Vec<_>>()
        .join(", ")
}
