//! OpenAI Whisper API client for speech-to-text transcription
//!
//! Uploads a finished session artifact (WAV or WebM) as a multipart form
//! and returns the transcript text.

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const OPENAI_TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Model used when the caller does not override it.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Consultations run long; give the upload and decode plenty of room.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors that can occur during transcription
#[derive(Debug)]
pub enum TranscriptionError {
    /// Failed to read audio file
    FileReadError(String),
    /// Network/HTTP error
    NetworkError(String),
    /// OpenAI API returned an error
    ApiError { status: u16, message: String },
    /// Failed to parse API response
    ParseError(String),
}

impl std::fmt::Display for TranscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptionError::FileReadError(e) => write!(f, "Failed to read audio file: {}", e),
            TranscriptionError::NetworkError(e) => write!(f, "Network error: {}", e),
            TranscriptionError::ApiError { status, message } => {
                write!(f, "OpenAI API error ({}): {}", status, message)
            }
            TranscriptionError::ParseError(e) => write!(f, "Failed to parse API response: {}", e),
        }
    }
}

impl std::error::Error for TranscriptionError {}

/// OpenAI Whisper API response
#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
}

/// OpenAI API error response
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Whisper client bound to one API key.
#[derive(Debug, Clone)]
pub struct TranscriptionClient {
    api_key: String,
    model: String,
    api_url: String,
    http: Client,
}

impl TranscriptionClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            api_url: OPENAI_TRANSCRIPTION_URL.to_string(),
            http: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the client at a different endpoint (used by the test harness).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Transcribe an audio file.
    ///
    /// `context_prompt` seeds Whisper with domain vocabulary; pass `None` to
    /// transcribe without one.
    ///
    /// # Returns
    /// * `Ok(String)` - The transcript text
    /// * `Err(TranscriptionError)` - Error details
    pub async fn transcribe(
        &self,
        audio_path: &Path,
        context_prompt: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        let file_bytes = tokio::fs::read(audio_path)
            .await
            .map_err(|e| TranscriptionError::FileReadError(e.to_string()))?;

        // Get filename for the multipart form
        let filename = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        log::info!(
            "Transcribing audio file: {} ({} bytes)",
            filename,
            file_bytes.len()
        );

        let file_part = Part::bytes(file_bytes)
            .file_name(filename)
            .mime_str(audio_mime(audio_path))
            .map_err(|e| TranscriptionError::ParseError(e.to_string()))?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "json");
        if let Some(prompt) = context_prompt {
            form = form.text("prompt", prompt.to_string());
        }

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            let whisper_response: WhisperResponse = response
                .json()
                .await
                .map_err(|e| TranscriptionError::ParseError(e.to_string()))?;

            log::info!(
                "Transcription successful: {} chars",
                whisper_response.text.len()
            );

            Ok(whisper_response.text)
        } else {
            let error_text = response.text().await.unwrap_or_default();

            let message =
                if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                    error_response.error.message
                } else {
                    error_text
                };

            log::error!("OpenAI API error ({}): {}", status.as_u16(), message);

            Err(TranscriptionError::ApiError {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// MIME type for the upload, keyed off the artifact extension.
fn audio_mime(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("webm") => "audio/webm",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        _ => "audio/wav",
    }
}
