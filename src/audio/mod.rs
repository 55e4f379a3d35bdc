//! Audio capture and encoding for consult-scribe
//!
//! This module handles microphone input capture and artifact encoding.
//! Uses CPAL for audio capture, hound for WAV encoding, and an external
//! ffmpeg process for the compressed WebM/Opus container.

pub mod capture;
pub mod encode;

pub use capture::{
    start_capture, AudioFrame, CaptureHandle, RecordedAudio, DEFAULT_SAMPLE_RATE, FRAME_SAMPLES,
};
pub use encode::{finalize_compressed, finalize_wav, EncodedArtifact, DEFAULT_OPUS_BITRATE_KBPS};

/// Errors that can occur during audio capture or encoding.
#[derive(Debug, Clone)]
pub enum AudioError {
    /// The input device could not be opened at capture start.
    DeviceUnavailable(String),
    /// The input device reported an error mid-capture.
    DeviceError(String),
    /// The external transcoder failed to launch or exited non-zero.
    EncodeFailed(String),
    /// WAV or temporary-file I/O failed.
    Io(String),
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::DeviceUnavailable(e) => {
                write!(f, "Audio input device unavailable: {}", e)
            }
            AudioError::DeviceError(e) => write!(f, "Audio input device error: {}", e),
            AudioError::EncodeFailed(e) => write!(f, "Audio encoding failed: {}", e),
            AudioError::Io(e) => write!(f, "Audio file I/O failed: {}", e),
        }
    }
}

impl std::error::Error for AudioError {}
