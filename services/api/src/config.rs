//! Application Configuration Module
//!
//! Centralizes configuration for the interview API service. Settings are
//! loaded from environment variables once at startup and handed around as
//! a single struct.

use std::env;
use tracing::Level;

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub chat_model: String,
    pub transcribe_model: String,
    pub bind_addr: String,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `OPENAI_API_KEY`: Secret key for the OpenAI API. Required.
    // *   `CHAT_MODEL`: (Optional) Model for the coaching oracle. Defaults to "gpt-4o".
    // *   `TRANSCRIBE_MODEL`: (Optional) Model for audio transcription. Defaults to "whisper-1".
    // *   `BIND_ADDR`: (Optional) Listen address. Defaults to "0.0.0.0:3000".
    // *   `RUST_LOG`: (Optional) Logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. Useful for local development, ignored if absent.
        dotenvy::dotenv().ok();

        let openai_api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let chat_model = env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let transcribe_model =
            env::var("TRANSCRIBE_MODEL").unwrap_or_else(|_| "whisper-1".to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            openai_api_key,
            chat_model,
            transcribe_model,
            bind_addr,
            log_level,
        })
    }
}
