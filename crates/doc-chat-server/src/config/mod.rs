mod settings;

pub use settings::{is_usable_key, GeminiConfig, ServerConfig, SessionConfig, Settings, UploadConfig};
