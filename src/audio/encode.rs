//! Encode & handoff
//!
//! Turns a finalized capture session into a durable artifact: either a raw
//! WAV written directly, or a WebM/Opus container produced by transcoding a
//! scoped temporary WAV through ffmpeg. The temporary file is owned by a
//! `NamedTempFile` and deleted on every exit path.

use std::path::{Path, PathBuf};
use std::process::Command;

use hound::{WavSpec, WavWriter};

use super::capture::RecordedAudio;
use super::AudioError;

/// Opus bitrate used by the CLI pipeline when transcoding to WebM.
pub const DEFAULT_OPUS_BITRATE_KBPS: u32 = 32;

const TRANSCODER_BIN: &str = "ffmpeg";

/// A durable audio artifact produced from a capture session.
#[derive(Debug, Clone)]
pub struct EncodedArtifact {
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// Write the session out as an uncompressed WAV (mono, 16-bit signed).
///
/// Consumes the session; the handoff is single-use. An empty session
/// returns `Ok(None)` without touching the filesystem.
pub fn finalize_wav(
    audio: RecordedAudio,
    path: &Path,
) -> Result<Option<EncodedArtifact>, AudioError> {
    if audio.is_empty() {
        log::info!("Empty session, no WAV written");
        return Ok(None);
    }

    let sample_rate = audio.sample_rate();
    let duration_secs = audio.duration_secs();
    let samples = audio.into_samples();
    write_wav(&samples, sample_rate, path)?;

    log::info!(
        "WAV written: {:?} ({} samples, {:.2}s)",
        path,
        samples.len(),
        duration_secs
    );
    Ok(Some(EncodedArtifact {
        path: path.to_path_buf(),
        duration_secs,
    }))
}

/// Transcode the session into a compressed WebM/Opus container at `path`.
///
/// The samples are first written to a temporary WAV, which is removed when
/// this function returns, whether the transcode succeeded, failed, or
/// panicked. A non-zero ffmpeg exit (or a failure to launch it) surfaces as
/// [`AudioError::EncodeFailed`] carrying the subprocess diagnostics.
pub fn finalize_compressed(
    audio: RecordedAudio,
    path: &Path,
    bitrate_kbps: u32,
) -> Result<Option<EncodedArtifact>, AudioError> {
    finalize_compressed_with(
        audio,
        path,
        bitrate_kbps,
        TRANSCODER_BIN,
        &std::env::temp_dir(),
    )
}

fn finalize_compressed_with(
    audio: RecordedAudio,
    path: &Path,
    bitrate_kbps: u32,
    transcoder: &str,
    tmp_dir: &Path,
) -> Result<Option<EncodedArtifact>, AudioError> {
    if audio.is_empty() {
        log::info!("Empty session, no transcode");
        return Ok(None);
    }

    let sample_rate = audio.sample_rate();
    let duration_secs = audio.duration_secs();
    let samples = audio.into_samples();

    // Lives until the end of this function, success or not.
    let tmp_wav = tempfile::Builder::new()
        .prefix("consult-scribe-")
        .suffix(".wav")
        .tempfile_in(tmp_dir)
        .map_err(|e| AudioError::Io(format!("create temporary WAV: {}", e)))?;

    write_wav(&samples, sample_rate, tmp_wav.path())?;
    run_transcoder(transcoder, tmp_wav.path(), path, bitrate_kbps)?;

    log::info!(
        "Transcoded {} samples to {:?} ({:.2}s, {}k Opus)",
        samples.len(),
        path,
        duration_secs,
        bitrate_kbps
    );
    Ok(Some(EncodedArtifact {
        path: path.to_path_buf(),
        duration_secs,
    }))
}

fn write_wav(samples: &[i16], sample_rate: u32, path: &Path) -> Result<(), AudioError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)
        .map_err(|e| AudioError::Io(format!("create WAV {:?}: {}", path, e)))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| AudioError::Io(format!("write WAV {:?}: {}", path, e)))?;
    }
    writer
        .finalize()
        .map_err(|e| AudioError::Io(format!("finalize WAV {:?}: {}", path, e)))?;
    Ok(())
}

fn run_transcoder(
    transcoder: &str,
    input: &Path,
    output: &Path,
    bitrate_kbps: u32,
) -> Result<(), AudioError> {
    let bitrate = format!("{}k", bitrate_kbps);
    log::debug!(
        "Transcoding {:?} -> {:?} (libopus, {})",
        input,
        output,
        bitrate
    );

    let result = Command::new(transcoder)
        .arg("-y")
        .arg("-i")
        .arg(input)
        .args(["-c:a", "libopus", "-b:a", &bitrate])
        .arg(output)
        .output();

    match result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            Err(AudioError::EncodeFailed(format!(
                "{} exited with {}: {}",
                transcoder,
                out.status,
                stderr.trim()
            )))
        }
        Err(e) => Err(AudioError::EncodeFailed(format!(
            "failed to launch {}: {}",
            transcoder, e
        ))),
    }
}
