use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::audio::{DEFAULT_OPUS_BITRATE_KBPS, DEFAULT_SAMPLE_RATE};
use crate::processing::prompt::DEFAULT_COMPLETION_MODEL;
use crate::transcription::DEFAULT_TRANSCRIPTION_MODEL;

const SETTINGS_FILE_NAME: &str = "settings.json";
const APP_DIR_NAME: &str = "consult-scribe";

/// Default Whisper context prompt biasing it toward consultation vocabulary.
pub const DEFAULT_TRANSCRIPTION_PROMPT: &str =
    "This is a medical consultation recording between a doctor and a patient.";

/// Container format for the session audio artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// Uncompressed WAV, written directly.
    #[default]
    Wav,

    /// WebM/Opus via ffmpeg, much smaller for long consultations.
    Webm,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Webm => "webm",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Whisper model used for transcription.
    pub transcription_model: String,

    /// Chat model used for note generation.
    pub completion_model: String,

    /// Capture sample rate in Hz.
    pub sample_rate: u32,

    /// Container format for the saved session audio.
    pub audio_format: AudioFormat,

    /// Opus bitrate when transcoding to WebM.
    pub opus_bitrate_kbps: u32,

    /// Where session artifacts land. Current directory when unset.
    pub output_dir: Option<PathBuf>,

    /// Context prompt sent with the transcription request.
    pub transcription_prompt: String,

    /// Directory holding per-kind system prompt overrides. When unset the
    /// built-in prompts are used.
    pub prompts_dir: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            audio_format: AudioFormat::Wav,
            opus_bitrate_kbps: DEFAULT_OPUS_BITRATE_KBPS,
            output_dir: None,
            transcription_prompt: DEFAULT_TRANSCRIPTION_PROMPT.to_string(),
            prompts_dir: None,
        }
    }
}

fn settings_path() -> Result<PathBuf, String> {
    let dir =
        dirs::config_dir().ok_or_else(|| "Could not determine config directory".to_string())?;
    Ok(dir.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
}

pub fn load_settings() -> AppSettings {
    let path = match settings_path() {
        Ok(p) => p,
        Err(e) => {
            log::warn!("Settings: {}", e);
            return AppSettings::default();
        }
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<AppSettings>(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Settings: failed to parse {:?}: {}", path, e);
                AppSettings::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppSettings::default(),
        Err(e) => {
            log::warn!("Settings: failed to read {:?}: {}", path, e);
            AppSettings::default()
        }
    }
}

pub fn save_settings(settings: &AppSettings) -> Result<(), String> {
    let path = settings_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory {:?}: {}", parent, e))?;
    }

    let contents =
        serde_json::to_string_pretty(settings).map_err(|e| format!("Serialize settings: {}", e))?;

    // Write atomically: write to a temp file in the same directory, then rename.
    // This prevents partial/corrupt settings.json if the app crashes mid-write.
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &contents)
        .map_err(|e| format!("Write temp settings {:?}: {}", tmp_path, e))?;

    // On Unix, rename will atomically replace the destination. On Windows, rename
    // fails if the destination exists, so we remove it first (ignoring NotFound).
    if cfg!(windows) {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(format!(
                        "Remove existing settings file {:?}: {}",
                        path, e
                    ));
                }
            }
        }
    }

    std::fs::rename(&tmp_path, &path).map_err(|e| {
        format!(
            "Rename temp settings {:?} to {:?}: {}",
            tmp_path, path, e
        )
    })?;
    Ok(())
}

/// Load settings and write the defaults file on first run so users have
/// something to edit.
pub fn ensure_settings_file() -> AppSettings {
    let settings = load_settings();
    match settings_path() {
        Ok(path) if !path.exists() => {
            if let Err(e) = save_settings(&settings) {
                log::warn!("Settings: could not write defaults: {}", e);
            } else {
                log::info!("Settings: wrote defaults to {:?}", path);
            }
        }
        Ok(_) => {}
        Err(e) => log::warn!("Settings: {}", e),
    }
    settings
}
