//! API credential discovery.
//!
//! The key is read from the environment at first use, after capture and
//! encode have already finished, so a recording is never lost to a missing
//! key.

/// Errors from resolving the OpenAI configuration
#[derive(Debug)]
pub enum ConfigError {
    /// OpenAI API key not configured
    MissingApiKey,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingApiKey => {
                write!(
                    f,
                    "OpenAI API key not configured. Set OPENAI_API_KEY environment variable."
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Credentials for the OpenAI clients.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
}

impl OpenAiConfig {
    /// Get the OpenAI API key from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => Ok(Self { api_key: key }),
            _ => Err(ConfigError::MissingApiKey),
        }
    }
}

/// Check if an API key is configured (for status display)
pub fn is_api_key_configured() -> bool {
    OpenAiConfig::from_env().is_ok()
}
