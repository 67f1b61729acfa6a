use futures::stream::{Stream, StreamExt};
use parking_lot::RwLock;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::document::DocumentRecord;
use crate::utils::error::SessionError;

use super::context_builder::ContextBuilder;
use super::types::{ChatRequest, ChatSession, ConversationTurn};

/// Sent when the remote side fails without saying why.
pub const FALLBACK_FAILURE_MESSAGE: &str = "AI failed to respond.";

/// Fragments of one model reply as produced by a provider.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, SessionError>> + Send>>;

/// Remote chat collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    /// Checked before any session is created.
    fn validate(&self) -> Result<(), SessionError>;

    async fn stream_chat(&self, request: ChatRequest) -> Result<TextStream, SessionError>;
}

/// Queue item between the producer task and `MessageStream`.
#[derive(Debug)]
enum StreamSignal {
    Chunk(String),
    Done,
    Failed(SessionError),
}

/// Owns the single active `ChatSession`.
///
/// Every initialization replaces the session wholesale. Callers must not
/// re-initialize while a `MessageStream` is still being consumed; the old
/// stream keeps talking to the session it started with.
pub struct SessionManager {
    provider: Arc<dyn ChatProvider>,
    context_builder: ContextBuilder,
    temperature: f32,
    stream_buffer: usize,
    active: RwLock<Option<Arc<ChatSession>>>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn ChatProvider>, config: &SessionConfig) -> Self {
        Self {
            provider,
            context_builder: ContextBuilder::new(config.base_instruction()),
            temperature: config.temperature,
            stream_buffer: config.stream_buffer.max(1),
            active: RwLock::new(None),
        }
    }

    pub fn initialize_session(
        &self,
        documents: &[DocumentRecord],
        history: Option<Vec<ConversationTurn>>,
    ) -> Result<(), SessionError> {
        self.provider.validate()?;

        let system_instruction = self.context_builder.build_system_instruction(documents);
        let history = history.unwrap_or_default();
        let session = Arc::new(ChatSession::new(system_instruction, self.temperature, history));

        info!(
            session_id = %session.id,
            documents = documents.len(),
            seeded_turns = session.turn_count(),
            "Chat session initialized"
        );

        *self.active.write() = Some(session);
        Ok(())
    }

    pub fn active_session(&self) -> Option<Arc<ChatSession>> {
        self.active.read().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.active.read().is_some()
    }

    /// Start streaming the reply to `text` on the active session.
    ///
    /// Must be called from within a tokio runtime.
    pub fn send_message(&self, text: &str) -> Result<MessageStream, SessionError> {
        let session = self.active_session().ok_or(SessionError::NotInitialized)?;
        let (tx, rx) = flume::bounded(self.stream_buffer);

        debug!(session_id = %session.id, "Sending message ({} chars)", text.chars().count());

        let session_id = session.id;
        let provider = self.provider.clone();
        let text = text.to_string();
        tokio::spawn(produce(provider, session, text, tx));

        Ok(MessageStream {
            session_id,
            receiver: rx,
            finished: false,
        })
    }
}

async fn produce(
    provider: Arc<dyn ChatProvider>,
    session: Arc<ChatSession>,
    text: String,
    tx: flume::Sender<StreamSignal>,
) {
    let request = session.request_for(&text);

    let mut upstream = match provider.stream_chat(request).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(session_id = %session.id, "Remote stream could not start: {}", e);
            let _ = tx.send_async(StreamSignal::Failed(with_fallback(e))).await;
            return;
        }
    };

    let mut reply = String::new();
    while let Some(item) = upstream.next().await {
        match item {
            Ok(fragment) if fragment.is_empty() => continue,
            Ok(fragment) => {
                reply.push_str(&fragment);
                if tx.send_async(StreamSignal::Chunk(fragment)).await.is_err() {
                    debug!(session_id = %session.id, "Consumer went away, abandoning reply");
                    return;
                }
            }
            Err(e) => {
                warn!(session_id = %session.id, "Remote stream failed: {}", e);
                let _ = tx.send_async(StreamSignal::Failed(with_fallback(e))).await;
                return;
            }
        }
    }

    session.record_exchange(&text, reply);
    let _ = tx.send_async(StreamSignal::Done).await;
}

fn with_fallback(err: SessionError) -> SessionError {
    match err {
        SessionError::RemoteStream(msg) if msg.trim().is_empty() => {
            SessionError::RemoteStream(FALLBACK_FAILURE_MESSAGE.to_string())
        }
        other => other,
    }
}

/// Consumer side of one streamed reply.
///
/// Yields fragments in arrival order, then ends. A failure is delivered as a
/// single `Err` after the fragments that already arrived.
pub struct MessageStream {
    session_id: Uuid,
    receiver: flume::Receiver<StreamSignal>,
    finished: bool,
}

impl MessageStream {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub async fn next_chunk(&mut self) -> Option<Result<String, SessionError>> {
        if self.finished {
            return None;
        }

        match self.receiver.recv_async().await {
            Ok(StreamSignal::Chunk(text)) => Some(Ok(text)),
            Ok(StreamSignal::Done) => {
                self.finished = true;
                None
            }
            Ok(StreamSignal::Failed(e)) => {
                self.finished = true;
                Some(Err(e))
            }
            // producer ended without a terminal signal
            Err(_) => {
                self.finished = true;
                Some(Err(SessionError::RemoteStream(FALLBACK_FAILURE_MESSAGE.to_string())))
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<String, SessionError>> + Send {
        futures::stream::unfold(self, |mut stream| async move {
            stream.next_chunk().await.map(|item| (item, stream))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::conversation::types::Role;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn doc(name: &str, content: &str) -> DocumentRecord {
        DocumentRecord {
            name: name.to_string(),
            content: content.to_string(),
            source_type: "text/plain".to_string(),
            size_bytes: content.len() as u64,
        }
    }

    fn scripted(items: Vec<Result<&'static str, SessionError>>) -> TextStream {
        let items: Vec<Result<String, SessionError>> =
            items.into_iter().map(|r| r.map(str::to_string)).collect();
        Box::pin(futures::stream::iter(items))
    }

    fn manager_with(mock: MockChatProvider) -> SessionManager {
        SessionManager::new(Arc::new(mock), &SessionConfig::default())
    }

    async fn collect(mut stream: MessageStream) -> (Vec<String>, Option<SessionError>) {
        let mut chunks = Vec::new();
        let mut failure = None;
        while let Some(item) = stream.next_chunk().await {
            match item {
                Ok(text) => chunks.push(text),
                Err(e) => failure = Some(e),
            }
        }
        (chunks, failure)
    }

    #[tokio::test]
    async fn test_send_before_initialize_fails() {
        let manager = manager_with(MockChatProvider::new());
        let err = manager.send_message("hello").err().unwrap();
        assert_eq!(err, SessionError::NotInitialized);
        assert_eq!(err.to_string(), "Session not initialized.");
    }

    #[tokio::test]
    async fn test_configuration_error_creates_no_session() {
        let mut mock = MockChatProvider::new();
        mock.expect_validate()
            .returning(|| Err(SessionError::Configuration("API key is missing".to_string())));
        mock.expect_stream_chat().never();

        let manager = manager_with(mock);
        let err = manager.initialize_session(&[doc("a.txt", "alpha")], None).unwrap_err();

        assert!(matches!(err, SessionError::Configuration(_)));
        assert!(!manager.is_initialized());
    }

    #[tokio::test]
    async fn test_fragments_arrive_in_order_and_extend_history() {
        let requests = Arc::new(parking_lot::Mutex::new(Vec::<ChatRequest>::new()));
        let seen = requests.clone();

        let mut mock = MockChatProvider::new();
        mock.expect_validate().returning(|| Ok(()));
        mock.expect_stream_chat().returning(move |req| {
            seen.lock().push(req);
            Ok(scripted(vec![Ok("Hel"), Ok(""), Ok("lo")]))
        });

        let manager = manager_with(mock);
        manager.initialize_session(&[doc("a.txt", "alpha")], None).unwrap();

        let (chunks, failure) = collect(manager.send_message("hi").unwrap()).await;
        assert_eq!(chunks, vec!["Hel", "lo"]);
        assert!(failure.is_none());

        let (chunks, _) = collect(manager.send_message("again").unwrap()).await;
        assert_eq!(chunks.concat(), "Hello");

        let requests = requests.lock();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].system_instruction.contains("--- DOCUMENT 1: a.txt ---"));
        assert_eq!(requests[0].temperature, 0.2);
        assert!(requests[0].history.is_empty());
        assert_eq!(requests[1].history.len(), 2);
        assert_eq!(requests[1].history[0].text, "hi");
        assert_eq!(requests[1].history[1].role, Role::Model);
        assert_eq!(requests[1].history[1].text, "Hello");
    }

    #[tokio::test]
    async fn test_mid_stream_failure_after_partial_output() {
        let mut mock = MockChatProvider::new();
        mock.expect_validate().returning(|| Ok(()));
        let calls = AtomicUsize::new(0);
        mock.expect_stream_chat().returning(move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(scripted(vec![
                    Ok("Hel"),
                    Ok("lo"),
                    Err(SessionError::RemoteStream("quota exceeded".to_string())),
                ]))
            } else {
                Ok(scripted(vec![Ok("still here")]))
            }
        });

        let manager = manager_with(mock);
        manager.initialize_session(&[doc("a.txt", "alpha")], None).unwrap();

        let (chunks, failure) = collect(manager.send_message("hi").unwrap()).await;
        assert_eq!(chunks, vec!["Hel", "lo"]);
        assert_eq!(failure, Some(SessionError::RemoteStream("quota exceeded".to_string())));

        let session = manager.active_session().unwrap();
        assert_eq!(session.turn_count(), 0);

        // session stays usable
        let (chunks, failure) = collect(manager.send_message("retry").unwrap()).await;
        assert_eq!(chunks, vec!["still here"]);
        assert!(failure.is_none());
    }

    #[tokio::test]
    async fn test_blank_remote_error_uses_fallback_message() {
        let mut mock = MockChatProvider::new();
        mock.expect_validate().returning(|| Ok(()));
        mock.expect_stream_chat()
            .returning(|_| Err(SessionError::RemoteStream(String::new())));

        let manager = manager_with(mock);
        manager.initialize_session(&[], None).unwrap();

        let (chunks, failure) = collect(manager.send_message("hi").unwrap()).await;
        assert!(chunks.is_empty());
        assert_eq!(failure.unwrap().to_string(), FALLBACK_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn test_reinitialize_with_seed_history() {
        let requests = Arc::new(parking_lot::Mutex::new(Vec::<ChatRequest>::new()));
        let seen = requests.clone();

        let mut mock = MockChatProvider::new();
        mock.expect_validate().returning(|| Ok(()));
        mock.expect_stream_chat().returning(move |req| {
            seen.lock().push(req);
            Ok(scripted(vec![Ok("ok")]))
        });

        let manager = manager_with(mock);
        manager.initialize_session(&[doc("a.txt", "alpha")], None).unwrap();
        let first = manager.active_session().unwrap().id;

        let seed = vec![ConversationTurn::user("q1"), ConversationTurn::model("a1")];
        manager
            .initialize_session(&[doc("a.txt", "alpha"), doc("b.txt", "beta")], Some(seed))
            .unwrap();
        let second = manager.active_session().unwrap();
        assert_ne!(first, second.id);

        collect(manager.send_message("q2").unwrap()).await;

        let requests = requests.lock();
        let sys = &requests[0].system_instruction;
        assert!(sys.find("DOCUMENT 1: a.txt").unwrap() < sys.find("DOCUMENT 2: b.txt").unwrap());
        let texts: Vec<&str> = requests[0].history.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["q1", "a1"]);
        assert_eq!(requests[0].message, "q2");
    }

    #[tokio::test]
    async fn test_dropping_consumer_stops_upstream() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();

        let mut mock = MockChatProvider::new();
        mock.expect_validate().returning(|| Ok(()));
        mock.expect_stream_chat().returning(move |_| {
            let counter = counter.clone();
            let endless = futures::stream::repeat_with(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, SessionError>("tick".to_string())
            });
            Ok(Box::pin(endless) as TextStream)
        });

        let config = SessionConfig {
            stream_buffer: 1,
            ..SessionConfig::default()
        };
        let manager = SessionManager::new(Arc::new(mock), &config);
        manager.initialize_session(&[], None).unwrap();

        let mut stream = manager.send_message("go").unwrap();
        assert_eq!(stream.next_chunk().await.unwrap().unwrap(), "tick");
        drop(stream);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let after_drop = pulled.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(pulled.load(Ordering::SeqCst), after_drop);
        assert!(after_drop < 10);
        assert_eq!(manager.active_session().unwrap().turn_count(), 0);
    }

    #[tokio::test]
    async fn test_into_stream_ends_after_failure() {
        let mut mock = MockChatProvider::new();
        mock.expect_validate().returning(|| Ok(()));
        mock.expect_stream_chat().returning(|_| {
            Ok(scripted(vec![
                Ok("a"),
                Err(SessionError::RemoteStream("boom".to_string())),
                Ok("never"),
            ]))
        });

        let manager = manager_with(mock);
        manager.initialize_session(&[], None).unwrap();

        let items: Vec<_> = manager.send_message("x").unwrap().into_stream().collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Ok("a".to_string()));
        assert!(items[1].is_err());
    }
}
