pub mod audio;
pub mod config;
pub mod files;
pub mod processing;
pub mod settings;
pub mod transcription;

use std::path::PathBuf;

use audio::{finalize_compressed, finalize_wav, start_capture, AudioError};
use config::{ConfigError, OpenAiConfig};
use files::FileError;
use processing::pipeline::{generate_notes, NoteResult};
use processing::prompt::{ensure_prompt_files, CompletionClient, CompletionError};
use processing::NoteKind;
use settings::AudioFormat;
use transcription::{TranscriptionClient, TranscriptionError};

/// Top-level error for the CLI pipeline.
#[derive(Debug)]
pub enum ScribeError {
    Config(ConfigError),
    Audio(AudioError),
    File(FileError),
    Transcription(TranscriptionError),
    Completion(CompletionError),
}

impl std::fmt::Display for ScribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScribeError::Config(e) => write!(f, "{}", e),
            ScribeError::Audio(e) => write!(f, "{}", e),
            ScribeError::File(e) => write!(f, "{}", e),
            ScribeError::Transcription(e) => write!(f, "{}", e),
            ScribeError::Completion(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ScribeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScribeError::Config(e) => Some(e),
            ScribeError::Audio(e) => Some(e),
            ScribeError::File(e) => Some(e),
            ScribeError::Transcription(e) => Some(e),
            ScribeError::Completion(e) => Some(e),
        }
    }
}

impl From<ConfigError> for ScribeError {
    fn from(e: ConfigError) -> Self {
        ScribeError::Config(e)
    }
}

impl From<AudioError> for ScribeError {
    fn from(e: AudioError) -> Self {
        ScribeError::Audio(e)
    }
}

impl From<FileError> for ScribeError {
    fn from(e: FileError) -> Self {
        ScribeError::File(e)
    }
}

impl From<TranscriptionError> for ScribeError {
    fn from(e: TranscriptionError) -> Self {
        ScribeError::Transcription(e)
    }
}

impl From<CompletionError> for ScribeError {
    fn from(e: CompletionError) -> Self {
        ScribeError::Completion(e)
    }
}

/// Record a consultation, save the audio, transcribe it, and generate notes.
///
/// Capture runs until the user presses Enter. The audio artifact is written
/// before the API key is even looked up, so a recording is never lost to a
/// missing key or a network problem.
pub async fn run() -> Result<(), ScribeError> {
    let settings = settings::ensure_settings_file();
    if let Some(dir) = &settings.prompts_dir {
        if let Err(e) = ensure_prompt_files(dir) {
            log::warn!("Could not write default prompt files: {}", e);
        }
    }

    let handle = start_capture(settings.sample_rate)?;

    println!("Recording... Press Enter to stop.");
    let mut line = String::new();
    if let Err(e) = std::io::stdin().read_line(&mut line) {
        log::warn!("Stdin closed ({}), stopping capture", e);
    }

    let recorded = handle.stop();
    if recorded.is_empty() {
        if let Some(err) = recorded.device_error() {
            return Err(ScribeError::Audio(AudioError::DeviceError(err.to_string())));
        }
        println!("No audio recorded.");
        return Ok(());
    }
    // A device error after some frames were captured keeps the partial data
    if let Some(err) = recorded.device_error() {
        println!("Recording ended early: {}", err);
    }

    let out_dir = settings
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    files::ensure_dir(&out_dir)?;

    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let session_name = format!("consult-{}", stamp);
    let audio_path = out_dir.join(format!(
        "{}.{}",
        session_name,
        settings.audio_format.extension()
    ));

    let artifact = match settings.audio_format {
        AudioFormat::Wav => finalize_wav(recorded, &audio_path)?,
        AudioFormat::Webm => {
            finalize_compressed(recorded, &audio_path, settings.opus_bitrate_kbps)?
        }
    };
    let Some(artifact) = artifact else {
        println!("No audio recorded.");
        return Ok(());
    };

    println!("Recording saved to {}", artifact.path.display());
    println!("Audio length: {:.2} seconds", artifact.duration_secs);

    // The recording is already safe on disk before the key is looked up.
    let credentials = OpenAiConfig::from_env()?;

    let context_prompt = if settings.transcription_prompt.trim().is_empty() {
        None
    } else {
        Some(settings.transcription_prompt.as_str())
    };
    let transcriber = TranscriptionClient::new(credentials.api_key.clone())
        .with_model(settings.transcription_model.clone());
    let transcript = transcriber.transcribe(&artifact.path, context_prompt).await?;

    println!("\n{}", transcript);
    let transcript_path = out_dir.join(format!("{}-transcript.txt", session_name));
    files::save_text(&transcript, &transcript_path)?;
    log::info!("Transcript saved to {:?}", transcript_path);

    let completions = CompletionClient::new(credentials.api_key)
        .with_model(settings.completion_model.clone());
    let results = generate_notes(
        &completions,
        &transcript,
        artifact.duration_secs,
        NoteKind::all(),
        settings.prompts_dir.as_deref(),
    )
    .await;

    let mut completed = 0usize;
    let mut first_error: Option<CompletionError> = None;
    for result in results {
        match result {
            NoteResult::Complete(note) => {
                let note_path = out_dir.join(format!("{}-{}", session_name, note.file_name()));
                files::save_text(&note.content, &note_path)?;
                println!("\n{}:\n{}", note.kind, note.content);
                log::info!("Note saved to {:?}", note_path);
                completed += 1;
            }
            NoteResult::Failed { kind, error } => {
                log::error!("Skipping note '{}': {}", kind, error);
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
    }

    if completed == 0 {
        if let Some(error) = first_error {
            return Err(ScribeError::Completion(error));
        }
    }

    Ok(())
}
