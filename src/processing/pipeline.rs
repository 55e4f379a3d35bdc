//! Note generation pipeline.
//!
//! Runs the transcript through the chat API once per requested note kind,
//! validates JSON where a kind expects it, and collects per-kind results so
//! one failed note never discards the others.

use super::prompt::{self, CompletionClient, CompletionError};
use super::NoteKind;
use std::path::Path;
use std::time::Instant;

/// A finished note for one kind.
#[derive(Debug, Clone)]
pub struct ConsultationNote {
    /// Which note this is
    pub kind: NoteKind,
    /// The text to store (pretty-printed JSON when validation succeeded)
    pub content: String,
    /// Parsed JSON for kinds that expect it, when the reply was valid
    pub structured: Option<serde_json::Value>,
}

impl ConsultationNote {
    /// File name for this note within a session's artifact set.
    pub fn file_name(&self) -> String {
        if self.structured.is_some() {
            format!("{}.json", self.kind.file_stem())
        } else {
            format!("{}.txt", self.kind.file_stem())
        }
    }
}

/// Outcome of generating one note kind.
#[derive(Debug)]
pub enum NoteResult {
    Complete(ConsultationNote),
    Failed { kind: NoteKind, error: CompletionError },
}

/// Consultation length in whole minutes, rounded up.
pub fn consultation_minutes(duration_secs: f64) -> u64 {
    (duration_secs / 60.0).ceil() as u64
}

/// Generate the requested notes from a transcript.
///
/// Each kind is one API call; results come back in the same order as
/// `kinds`, with failures kept alongside completed notes.
pub async fn generate_notes(
    client: &CompletionClient,
    transcript: &str,
    duration_secs: f64,
    kinds: &[NoteKind],
    prompts_dir: Option<&Path>,
) -> Vec<NoteResult> {
    let minutes = consultation_minutes(duration_secs);
    let mut results = Vec::with_capacity(kinds.len());

    for &kind in kinds {
        let start = Instant::now();
        let system = prompt::system_prompt(kind, minutes, prompts_dir);

        match client.ask(&system, transcript).await {
            Ok(reply) => {
                let note = finish_note(kind, reply);
                log::info!(
                    "Note '{}' generated in {} ms ({} chars)",
                    kind,
                    start.elapsed().as_millis(),
                    note.content.len()
                );
                results.push(NoteResult::Complete(note));
            }
            Err(error) => {
                log::error!("Note '{}' failed: {}", kind, error);
                results.push(NoteResult::Failed { kind, error });
            }
        }
    }

    results
}

/// Turn a raw model reply into a note, validating JSON where expected.
///
/// A reply that should be JSON but does not parse is kept as raw text
/// rather than thrown away.
fn finish_note(kind: NoteKind, reply: String) -> ConsultationNote {
    if !kind.expects_json() {
        return ConsultationNote {
            kind,
            content: reply.trim().to_string(),
            structured: None,
        };
    }

    let candidate = strip_code_fences(&reply);
    match serde_json::from_str::<serde_json::Value>(candidate) {
        Ok(value) => {
            let content = serde_json::to_string_pretty(&value)
                .unwrap_or_else(|_| candidate.to_string());
            ConsultationNote {
                kind,
                content,
                structured: Some(value),
            }
        }
        Err(e) => {
            log::warn!("Note '{}' is not valid JSON ({}), keeping raw text", kind, e);
            ConsultationNote {
                kind,
                content: reply.trim().to_string(),
                structured: None,
            }
        }
    }
}

/// Strip a Markdown code fence (with or without a language tag) from a
/// model reply, returning the inner text.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(newline) = rest.find('\n') else {
        return trimmed;
    };
    let body = &rest[newline + 1..];
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => trimmed,
    }
}
