use anyhow::{bail, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::services::conversation::ContextBuilder;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub session: SessionConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeminiConfig {
    #[serde(default, skip_serializing)]
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-3-flash-preview".to_string(),
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    pub temperature: f32,
    /// Overrides the built-in document analysis policy when set.
    #[serde(default)]
    pub base_instruction: Option<String>,
    /// Capacity of the fragment queue between the remote stream and the consumer.
    pub stream_buffer: usize,
}

impl SessionConfig {
    pub fn base_instruction(&self) -> String {
        self.base_instruction
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(ContextBuilder::default_base_instruction)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            base_instruction: None,
            stream_buffer: 32,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    pub max_body_bytes: usize,
    pub max_files: usize,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::builder()?
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = config.try_deserialize()?;
        settings.gemini.api_key = resolve_api_key(&settings.gemini.api_key);
        settings.validate()?;
        Ok(settings)
    }

    fn builder() -> Result<config::builder::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let gemini = GeminiConfig::default();
        let session = SessionConfig::default();

        Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("gemini.base_url", gemini.base_url)?
            .set_default("gemini.model", gemini.model)?
            .set_default("gemini.timeout_seconds", gemini.timeout_seconds as i64)?
            .set_default("session.temperature", session.temperature as f64)?
            .set_default("session.stream_buffer", session.stream_buffer as i64)?
            .set_default("upload.max_body_bytes", 50i64 * 1024 * 1024)?
            .set_default("upload.max_files", 20)
    }

    pub fn validate(&self) -> Result<()> {
        if !is_usable_key(&self.gemini.api_key) {
            bail!("Gemini API key is missing; set APP__GEMINI__API_KEY or GEMINI_API_KEY");
        }
        if !(0.0..=2.0).contains(&self.session.temperature) {
            bail!("session.temperature must be within 0.0..=2.0");
        }
        if self.session.stream_buffer == 0 {
            bail!("session.stream_buffer must be greater than zero");
        }
        Ok(())
    }
}

/// A key that is blank or the literal `undefined` (what a missing env var
/// turns into in some build setups) counts as absent.
pub fn is_usable_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && key != "undefined"
}

fn resolve_api_key(configured: &str) -> String {
    if is_usable_key(configured) {
        return configured.trim().to_string();
    }

    ["GEMINI_API_KEY", "API_KEY"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| is_usable_key(value))
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}
