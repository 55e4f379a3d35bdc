//! Speech-to-text transcription via the OpenAI Whisper API.

mod openai;

pub use openai::{TranscriptionClient, TranscriptionError, DEFAULT_TRANSCRIPTION_MODEL};
