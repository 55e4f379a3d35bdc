//! Microphone capture loop
//!
//! Capture runs on a dedicated background thread that owns the CPAL input
//! stream. The thread assembles fixed-size frames from device callbacks and
//! appends them to a shared, ordered frame list until the caller signals
//! stop. Stopping joins the thread, so once `CaptureHandle::stop` returns
//! the frame sequence is final and safe to read without synchronization.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use uuid::Uuid;

use super::AudioError;

/// Samples per frame, the unit of appending.
pub const FRAME_SAMPLES: usize = 1024;

/// Sample rate used by the CLI pipeline.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// How long to wait for the capture thread to open the input device.
const DEVICE_READY_TIMEOUT: Duration = Duration::from_secs(3);

/// One fixed-size block of 16-bit samples, immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<i16>,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Assembles arbitrary-size device callback slices into whole frames.
///
/// Samples still pending when capture stops never become a frame; every
/// appended frame holds exactly `frame_len` samples.
struct FrameAssembler {
    frame_len: usize,
    pending: Vec<i16>,
}

impl FrameAssembler {
    fn new(frame_len: usize) -> Self {
        Self {
            frame_len,
            pending: Vec::with_capacity(frame_len),
        }
    }

    fn push(&mut self, sample: i16, completed: &mut Vec<AudioFrame>) {
        self.pending.push(sample);
        if self.pending.len() == self.frame_len {
            let full = std::mem::replace(&mut self.pending, Vec::with_capacity(self.frame_len));
            completed.push(AudioFrame::new(full));
        }
    }
}

/// The finalized result of a capture session.
///
/// Frames are in strict temporal order. If the device reported an error
/// mid-capture, the frames collected before the error are retained and the
/// error message is available via [`RecordedAudio::device_error`].
#[derive(Debug)]
pub struct RecordedAudio {
    frames: Vec<AudioFrame>,
    sample_rate: u32,
    device_error: Option<String>,
}

impl RecordedAudio {
    /// Build a session result directly from frames (no device involved).
    pub fn from_frames(frames: Vec<AudioFrame>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate,
            device_error: None,
        }
    }

    pub fn frames(&self) -> &[AudioFrame] {
        &self.frames
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total sample count across all frames.
    pub fn total_samples(&self) -> usize {
        self.frames.iter().map(AudioFrame::len).sum()
    }

    /// Duration in seconds: total samples / sample rate.
    pub fn duration_secs(&self) -> f64 {
        self.total_samples() as f64 / self.sample_rate as f64
    }

    /// Error reported by the input device mid-capture, if any.
    pub fn device_error(&self) -> Option<&str> {
        self.device_error.as_deref()
    }

    /// Concatenate all frames into one contiguous buffer, preserving order.
    pub fn into_samples(self) -> Vec<i16> {
        let mut samples = Vec::with_capacity(self.total_samples());
        for frame in self.frames {
            samples.extend_from_slice(&frame.samples);
        }
        samples
    }
}

/// Handle to an active capture session.
///
/// Exactly one background thread is appending frames while this handle is
/// live. Call [`CaptureHandle::stop`] to end the session and take the
/// frames; dropping the handle instead also ends capture (the stop channel
/// closes) but discards everything recorded.
pub struct CaptureHandle {
    session_id: Uuid,
    sample_rate: u32,
    frames: Arc<Mutex<Vec<AudioFrame>>>,
    capture_error: Arc<Mutex<Option<String>>>,
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

impl CaptureHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Signal the capture thread to stop and wait for it to exit.
    ///
    /// The join guarantees every frame the thread will ever append has been
    /// appended before this returns. Always succeeds; a mid-capture device
    /// error does not discard the frames collected before it.
    pub fn stop(self) -> RecordedAudio {
        let _ = self.stop_tx.send(());
        if self.thread.join().is_err() {
            log::error!("Capture thread panicked (session {})", self.session_id);
        }

        let frames = std::mem::take(&mut *self.frames.lock().unwrap());
        let device_error = self.capture_error.lock().unwrap().take();

        if let Some(err) = &device_error {
            log::warn!(
                "Input device errored mid-capture (session {}), keeping {} frames: {}",
                self.session_id,
                frames.len(),
                err
            );
        }

        let recorded = RecordedAudio {
            frames,
            sample_rate: self.sample_rate,
            device_error,
        };
        log::info!(
            "Capture stopped (session {}): {} frames, {} samples, {:.2}s",
            self.session_id,
            recorded.frames.len(),
            recorded.total_samples(),
            recorded.duration_secs()
        );
        recorded
    }
}

/// Start capturing from the default input device.
///
/// Spawns the capture thread and blocks until the thread has opened the
/// device and started the stream (or failed to). On failure the thread is
/// joined before returning, so no capture is left running.
pub fn start_capture(sample_rate: u32) -> Result<CaptureHandle, AudioError> {
    if sample_rate == 0 {
        return Err(AudioError::DeviceUnavailable(
            "sample rate must be greater than zero".to_string(),
        ));
    }

    let session_id = Uuid::new_v4();
    let frames: Arc<Mutex<Vec<AudioFrame>>> = Arc::new(Mutex::new(Vec::new()));
    let capture_error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

    let thread_frames = frames.clone();
    let thread_error = capture_error.clone();
    let thread = thread::spawn(move || {
        let result = (|| -> Result<(), String> {
            let stream = open_input_stream(sample_rate, thread_frames, thread_error)?;
            stream.play().map_err(|e| e.to_string())?;
            let _ = ready_tx.send(Ok(()));

            // Block until the caller signals stop (or drops the handle),
            // then release the device before the thread exits.
            let _ = stop_rx.recv();
            drop(stream);
            Ok(())
        })();

        if let Err(err) = result {
            let _ = ready_tx.send(Err(err));
        }
    });

    match ready_rx.recv_timeout(DEVICE_READY_TIMEOUT) {
        Ok(Ok(())) => {
            log::info!(
                "Capture started (session {}): {} Hz, mono, {}-sample frames",
                session_id,
                sample_rate,
                FRAME_SAMPLES
            );
            Ok(CaptureHandle {
                session_id,
                sample_rate,
                frames,
                capture_error,
                stop_tx,
                thread,
            })
        }
        Ok(Err(err)) => {
            let _ = thread.join();
            log::error!("Failed to start capture: {}", err);
            Err(AudioError::DeviceUnavailable(err))
        }
        Err(_) => {
            let _ = stop_tx.send(());
            let _ = thread.join();
            log::error!("Timed out waiting for the input device");
            Err(AudioError::DeviceUnavailable(
                "timed out waiting for the input device".to_string(),
            ))
        }
    }
}

/// Open the default input device and build a mono input stream at the
/// requested rate, appending completed frames to `frames`.
fn open_input_stream(
    sample_rate: u32,
    frames: Arc<Mutex<Vec<AudioFrame>>>,
    capture_error: Arc<Mutex<Option<String>>>,
) -> Result<cpal::Stream, String> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| "no input device available".to_string())?;

    log::debug!("Using audio input device: {:?}", device.name());

    let supported = device
        .default_input_config()
        .map_err(|e| format!("no supported input config: {}", e))?;
    let sample_format = supported.sample_format();

    let config = StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    match sample_format {
        SampleFormat::I16 => build_input_stream::<i16>(&device, &config, frames, capture_error),
        SampleFormat::U16 => build_input_stream::<u16>(&device, &config, frames, capture_error),
        SampleFormat::F32 => build_input_stream::<f32>(&device, &config, frames, capture_error),
        other => Err(format!("unsupported sample format {:?}", other)),
    }
}

fn build_input_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    frames: Arc<Mutex<Vec<AudioFrame>>>,
    capture_error: Arc<Mutex<Option<String>>>,
) -> Result<cpal::Stream, String>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let mut assembler = FrameAssembler::new(FRAME_SAMPLES);

    let err_fn = move |err: cpal::StreamError| {
        log::error!("Input stream error: {}", err);
        let mut slot = capture_error.lock().unwrap();
        if slot.is_none() {
            *slot = Some(err.to_string());
        }
    };

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mut completed = Vec::new();
                for &sample in data {
                    assembler.push(sample_to_i16(sample), &mut completed);
                }
                if !completed.is_empty() {
                    frames.lock().unwrap().extend(completed);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| format!("failed to open input stream: {}", e))?;

    Ok(stream)
}

/// Convert any sample type to i16 with clamping.
fn sample_to_i16<T>(sample: T) -> i16
where
    T: cpal::Sample,
    f32: cpal::FromSample<T>,
{
    let f32_sample: f32 = cpal::Sample::from_sample(sample);
    let clamped = f32_sample.clamp(-1.0, 1.0);
    (clamped * i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker_frame(marker: i16, len: usize) -> AudioFrame {
        AudioFrame::new(vec![marker; len])
    }

    #[test]
    fn test_sample_to_i16() {
        assert_eq!(sample_to_i16(0.0f32), 0);
        assert_eq!(sample_to_i16(1.0f32), i16::MAX);
        assert_eq!(sample_to_i16(-1.0f32), -i16::MAX);

        // Out-of-range input is clamped
        assert_eq!(sample_to_i16(2.0f32), i16::MAX);
        assert_eq!(sample_to_i16(-2.0f32), -i16::MAX);
    }

    #[test]
    fn test_assembler_emits_only_whole_frames() {
        let mut assembler = FrameAssembler::new(4);
        let mut completed = Vec::new();

        for sample in 0..10i16 {
            assembler.push(sample, &mut completed);
        }

        // 10 samples at 4 per frame: two whole frames, two pending
        assert_eq!(completed.len(), 2);
        assert_eq!(completed[0].samples(), &[0, 1, 2, 3]);
        assert_eq!(completed[1].samples(), &[4, 5, 6, 7]);
        assert_eq!(assembler.pending, vec![8, 9]);
    }

    #[test]
    fn test_assembler_preserves_order_across_pushes() {
        let mut assembler = FrameAssembler::new(3);
        let mut completed = Vec::new();

        for chunk in [&[0i16, 1][..], &[2, 3, 4, 5][..], &[6, 7, 8][..]] {
            for &sample in chunk {
                assembler.push(sample, &mut completed);
            }
        }

        let flat: Vec<i16> = completed
            .iter()
            .flat_map(|f| f.samples().to_vec())
            .collect();
        assert_eq!(flat, vec![0, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_recorded_audio_counts_and_duration() {
        let frames = vec![
            marker_frame(0, FRAME_SAMPLES),
            marker_frame(1, FRAME_SAMPLES),
            marker_frame(2, FRAME_SAMPLES),
        ];
        let audio = RecordedAudio::from_frames(frames, DEFAULT_SAMPLE_RATE);

        assert_eq!(audio.total_samples(), 3 * FRAME_SAMPLES);
        assert_eq!(audio.duration_secs(), 3072.0 / 44100.0);
        assert!(!audio.is_empty());
        assert!(audio.device_error().is_none());
    }

    #[test]
    fn test_empty_session_has_zero_duration() {
        let audio = RecordedAudio::from_frames(Vec::new(), DEFAULT_SAMPLE_RATE);
        assert!(audio.is_empty());
        assert_eq!(audio.total_samples(), 0);
        assert_eq!(audio.duration_secs(), 0.0);
    }

    #[test]
    fn test_into_samples_matches_manual_concatenation() {
        let frames = vec![
            AudioFrame::new(vec![1, 2, 3]),
            AudioFrame::new(vec![4, 5, 6]),
            AudioFrame::new(vec![7, 8, 9]),
        ];
        let mut expected = Vec::new();
        for frame in &frames {
            expected.extend_from_slice(frame.samples());
        }

        let audio = RecordedAudio::from_frames(frames, DEFAULT_SAMPLE_RATE);
        assert_eq!(audio.into_samples(), expected);
    }

    #[test]
    fn test_zero_sample_rate_is_rejected() {
        match start_capture(0) {
            Err(AudioError::DeviceUnavailable(msg)) => {
                assert!(msg.contains("sample rate"));
            }
            other => panic!("expected DeviceUnavailable, got {:?}", other.map(|_| ())),
        }
    }
}
