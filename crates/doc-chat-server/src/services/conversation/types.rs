use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Speaker of a conversation turn. Serialized with the remote API's role names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One prior exchange unit used to seed or extend a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// Everything the provider needs for one streamed reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system_instruction: String,
    pub history: Vec<ConversationTurn>,
    pub temperature: f32,
    pub message: String,
}

/// Stateful handle to the remote conversation.
///
/// Created by `SessionManager::initialize_session` and never mutated apart
/// from its history, which grows by one user/model pair per completed
/// exchange.
#[derive(Debug)]
pub struct ChatSession {
    pub id: Uuid,
    pub system_instruction: String,
    pub temperature: f32,
    history: Mutex<Vec<ConversationTurn>>,
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(system_instruction: String, temperature: f32, history: Vec<ConversationTurn>) -> Self {
        Self {
            id: Uuid::new_v4(),
            system_instruction,
            temperature,
            history: Mutex::new(history),
            created_at: Utc::now(),
        }
    }

    /// Snapshot of the turns sent along with the next message.
    pub fn history(&self) -> Vec<ConversationTurn> {
        self.history.lock().clone()
    }

    pub fn turn_count(&self) -> usize {
        self.history.lock().len()
    }

    pub fn request_for(&self, message: &str) -> ChatRequest {
        ChatRequest {
            system_instruction: self.system_instruction.clone(),
            history: self.history(),
            temperature: self.temperature,
            message: message.to_string(),
        }
    }

    /// Record a completed exchange.
    pub fn record_exchange(&self, user_text: &str, reply: String) {
        let mut history = self.history.lock();
        history.push(ConversationTurn::user(user_text));
        history.push(ConversationTurn::model(reply));
    }
}
