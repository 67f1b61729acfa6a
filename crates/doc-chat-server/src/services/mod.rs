pub mod conversation;
pub mod gemini;
pub mod workspace;

pub use conversation::SessionManager;
pub use gemini::GeminiService;
pub use workspace::ChatWorkspace;
