//! Post-processing module for consultation transcripts.
//!
//! This module turns a raw transcript into the structured notes a doctor
//! wants after a consultation. Note kinds include:
//! - PatientInfo: structured patient record as JSON
//! - Diagnoses: diagnoses the doctor mentioned
//! - DiagnosisSuggestions: likely diagnoses the doctor did not mention
//! - Anamnesis: anamnesis summary
//! - FurtherSteps: follow-up questions and investigations

pub mod pipeline;
pub mod prompt;

use serde::{Deserialize, Serialize};

/// Kind of note generated from a consultation transcript.
///
/// Each kind sends the transcript through the chat API with a different
/// system prompt and gets its own output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// Structured patient record (name, age, complaint, history, ...) as JSON.
    #[default]
    PatientInfo,

    /// Comma-separated list of diagnoses the doctor mentioned.
    Diagnoses,

    /// Likely diagnoses based on the anamnesis that the doctor did not mention.
    DiagnosisSuggestions,

    /// Anamnesis summary of the conversation.
    Anamnesis,

    /// Follow-up questions and further investigations to consider.
    FurtherSteps,
}

impl NoteKind {
    /// Get the display label for this note kind.
    pub fn label(&self) -> &'static str {
        match self {
            NoteKind::PatientInfo => "Patient info",
            NoteKind::Diagnoses => "Diagnoses",
            NoteKind::DiagnosisSuggestions => "Diagnosis suggestions",
            NoteKind::Anamnesis => "Anamnesis",
            NoteKind::FurtherSteps => "Further steps",
        }
    }

    /// Get a short description of what this note contains.
    pub fn description(&self) -> &'static str {
        match self {
            NoteKind::PatientInfo => "Structured patient record as JSON",
            NoteKind::Diagnoses => "Diagnoses the doctor mentioned",
            NoteKind::DiagnosisSuggestions => "Likely diagnoses the doctor did not mention",
            NoteKind::Anamnesis => "Anamnesis summary",
            NoteKind::FurtherSteps => "Follow-up questions and investigations",
        }
    }

    /// File stem used for output files and prompt overrides.
    pub fn file_stem(&self) -> &'static str {
        match self {
            NoteKind::PatientInfo => "patient-info",
            NoteKind::Diagnoses => "diagnoses",
            NoteKind::DiagnosisSuggestions => "diagnosis-suggestions",
            NoteKind::Anamnesis => "anamnesis",
            NoteKind::FurtherSteps => "further-steps",
        }
    }

    /// Whether the model is asked for JSON that should be validated.
    pub fn expects_json(&self) -> bool {
        matches!(self, NoteKind::PatientInfo)
    }

    /// Get all note kinds in generation order.
    pub fn all() -> &'static [NoteKind] {
        &[
            NoteKind::PatientInfo,
            NoteKind::Diagnoses,
            NoteKind::DiagnosisSuggestions,
            NoteKind::Anamnesis,
            NoteKind::FurtherSteps,
        ]
    }
}

impl std::fmt::Display for NoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
