//! Chat-completion client and the system prompts for each note kind.
//!
//! Every note kind is one call to the OpenAI Chat Completions API with its
//! own system prompt and the transcript as the user message. Prompts can be
//! overridden per kind by dropping a `<file-stem>.txt` file into the prompts
//! directory.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::NoteKind;

/// OpenAI Chat Completions API endpoint.
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Model used when the caller does not override it.
pub const DEFAULT_COMPLETION_MODEL: &str = "o3";

/// Reasoning models take their time on long transcripts.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const DIAGNOSES_PROMPT: &str = "You are given a conversation between a doctor and a patient \
     and your job is to return a comma separated list of each potential diagnosis that the \
     doctor finds. Do not return diagnoses that the doctor does not mention. If no diagnoses \
     are found, return \"none\".";

const DIAGNOSIS_SUGGESTIONS_PROMPT: &str = "You are given a conversation between a doctor and \
     a patient and your job is to return a comma separated list of any likely diagnoses based \
     on the anamnesis but which the doctor did not suggest in the conversation. If no diagnoses \
     are likely in addition to what the doctor recommended, return \"none\".";

const ANAMNESIS_PROMPT: &str = "You are given a conversation between a doctor and a patient \
     and your job is to generate an anamnesis summary.";

const FURTHER_STEPS_PROMPT: &str = "You are given a conversation between a doctor and a \
     patient and your job is to suggest additional questions the doctor should ask the patient \
     and recommend further investigations or tests that might be helpful.";

/// Patient-record extraction prompt with the consultation length baked in.
pub fn patient_info_prompt(minutes: u64) -> String {
    format!(
        "You are given a conversation between a doctor and a patient. Your job is to extract \
         information about the patient and return it in json format. The json should have the \
         following keys: name, age, gender, height, weight, main complaint, recent medical \
         history, past medical history, drugs taken, risk factors, allergies, family history, \
         social history, physical examination results, and consultation time. For consultation \
         time use {} minutes as the value. Only return the json, no other text. Include all the \
         json keys in the order they are listed. Do not include any other keys or nested keys. \
         If you cannot find the information for certain fields, put \"unknown\" for the value. \
         Write the values in 3rd person in a concise and medically accurate way and include \
         units like cm, kg, years, etc.",
        minutes
    )
}

/// Built-in prompt for kinds whose text does not depend on the session.
fn static_default(kind: NoteKind) -> Option<&'static str> {
    match kind {
        NoteKind::PatientInfo => None,
        NoteKind::Diagnoses => Some(DIAGNOSES_PROMPT),
        NoteKind::DiagnosisSuggestions => Some(DIAGNOSIS_SUGGESTIONS_PROMPT),
        NoteKind::Anamnesis => Some(ANAMNESIS_PROMPT),
        NoteKind::FurtherSteps => Some(FURTHER_STEPS_PROMPT),
    }
}

/// Resolve the system prompt for a note kind.
///
/// An override file at `<prompts_dir>/<file-stem>.txt` wins over the
/// built-in text. Overrides for [`NoteKind::PatientInfo`] get the
/// consultation-time sentence appended, since the file cannot know the
/// session length.
pub fn system_prompt(kind: NoteKind, minutes: u64, prompts_dir: Option<&Path>) -> String {
    if let Some(dir) = prompts_dir {
        let path = dir.join(format!("{}.txt", kind.file_stem()));
        match std::fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => {
                log::debug!("Using prompt override from {:?}", path);
                let mut prompt = text.trim().to_string();
                if kind == NoteKind::PatientInfo {
                    prompt.push_str(&format!(
                        " For consultation time use {} minutes as the value.",
                        minutes
                    ));
                }
                return prompt;
            }
            Ok(_) => log::warn!("Prompt override {:?} is empty, using built-in text", path),
            Err(_) => {}
        }
    }

    match static_default(kind) {
        Some(text) => text.to_string(),
        None => patient_info_prompt(minutes),
    }
}

/// Write the built-in prompt texts into the prompts directory so users have
/// something to edit. Existing files are left alone.
pub fn ensure_prompt_files(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    for kind in NoteKind::all() {
        let Some(default) = static_default(*kind) else {
            continue;
        };
        let path = dir.join(format!("{}.txt", kind.file_stem()));
        if !path.exists() {
            std::fs::write(&path, default)?;
            log::info!("Wrote default prompt file {:?}", path);
        }
    }
    Ok(())
}

/// Errors that can occur while generating a note
#[derive(Debug)]
pub enum CompletionError {
    /// Network/HTTP error
    NetworkError(String),
    /// OpenAI API returned an error
    ApiError { status: u16, message: String },
    /// Failed to parse API response
    ParseError(String),
    /// API returned no choices
    EmptyResponse,
}

impl std::fmt::Display for CompletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionError::NetworkError(e) => write!(f, "Network error: {}", e),
            CompletionError::ApiError { status, message } => {
                write!(f, "OpenAI API error ({}): {}", status, message)
            }
            CompletionError::ParseError(e) => write!(f, "Failed to parse API response: {}", e),
            CompletionError::EmptyResponse => write!(f, "Empty response from API"),
        }
    }
}

impl std::error::Error for CompletionError {}

/// Request body for Chat Completions API.
///
/// Reasoning models reject sampling parameters, so the body carries
/// the model and messages and nothing else.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

/// Chat message structure.
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Response from Chat Completions API.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Choice in the response.
#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

/// Message in response.
#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

/// Error response from OpenAI.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<String>,
}

/// Chat-completion client bound to one API key.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    api_key: String,
    model: String,
    api_url: String,
    http: Client,
}

impl CompletionClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            api_url: OPENAI_CHAT_URL.to_string(),
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

    /// Send one system/user prompt pair and return the reply text.
    ///
    /// Failures are returned to the caller as-is; one note kind failing
    /// must not burn quota retrying while the others wait.
    pub async fn ask(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
        };

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            let chat_response: ChatResponse = response
                .json()
                .await
                .map_err(|e| CompletionError::ParseError(e.to_string()))?;

            let text = chat_response
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content.trim().to_string())
                .ok_or(CompletionError::EmptyResponse)?;

            log::debug!("Completion succeeded: {} chars", text.len());
            Ok(text)
        } else {
            let error_text = response.text().await.unwrap_or_default();

            let message =
                if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_text) {
                    match error_response.error.code {
                        Some(code) => format!("{} (code: {})", error_response.error.message, code),
                        None => error_response.error.message,
                    }
                } else {
                    error_text
                };

            log::error!("OpenAI API error ({}): {}", status.as_u16(), message);

            Err(CompletionError::ApiError {
                status: status.as_u16(),
                message,
            })
        }
    }
}
