//! Chat session context management.
//!
//! Holds the single active session, turns the active documents into a
//! system instruction and streams replies from the remote provider.

mod context_builder;
pub mod manager;
pub mod types;

pub use context_builder::ContextBuilder;
pub use manager::{ChatProvider, MessageStream, SessionManager, TextStream, FALLBACK_FAILURE_MESSAGE};
pub use types::{ChatRequest, ChatSession, ConversationTurn, Role};
