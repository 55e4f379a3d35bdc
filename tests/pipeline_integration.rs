//! Integration tests for the consultation pipeline
//!
//! These tests cover audio finalization, the OpenAI clients against a mock
//! server, and note generation end to end.
//!
//! ## Running Tests
//!
//! ### Mock tests (no API key, microphone, or ffmpeg needed):
//! ```bash
//! cargo test --test pipeline_integration mock_
//! ```
//!
//! ### Capture tests (require a working input device):
//! ```bash
//! cargo test --test pipeline_integration capture_
//! ```
//!
//! ### ffmpeg tests (require ffmpeg on PATH):
//! ```bash
//! cargo test --test pipeline_integration ffmpeg_
//! ```
//!
//! ### Integration tests (hit the real API, require an API key):
//! ```bash
//! export OPENAI_API_KEY=sk-your-key
//! cargo test --test pipeline_integration integration_
//! ```

use std::path::PathBuf;

use consult_scribe::audio::{
    finalize_compressed, finalize_wav, AudioError, AudioFrame, RecordedAudio, FRAME_SAMPLES,
};
use consult_scribe::config::is_api_key_configured;
use consult_scribe::processing::pipeline::{generate_notes, NoteResult};
use consult_scribe::processing::prompt::{CompletionClient, CompletionError};
use consult_scribe::processing::NoteKind;
use consult_scribe::transcription::{TranscriptionClient, TranscriptionError};

/// Build a session of full frames where frame `i` is filled with marker `i`.
fn synthetic_audio(frame_count: usize, sample_rate: u32) -> RecordedAudio {
    let frames = (0..frame_count)
        .map(|i| AudioFrame::new(vec![i as i16; FRAME_SAMPLES]))
        .collect();
    RecordedAudio::from_frames(frames, sample_rate)
}

/// Write a short silent WAV for upload tests.
fn write_silence_wav(path: &std::path::Path, seconds: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create test wav");
    for _ in 0..(44_100 * seconds) {
        writer.write_sample(0i16).expect("write test sample");
    }
    writer.finalize().expect("finalize test wav");
}

fn ffmpeg_available() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

// ============================================================================
// Encode Tests - Pure finalization, no external tools
// ============================================================================

mod encode_tests {
    use super::*;

    #[test]
    fn encode_wav_preserves_count_order_and_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.wav");

        let artifact = finalize_wav(synthetic_audio(3, 44_100), &path)
            .unwrap()
            .expect("three frames are not an empty session");

        assert_eq!(artifact.duration_secs, 3072.0 / 44100.0);

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 44_100);
        assert_eq!(reader.spec().bits_per_sample, 16);

        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 3 * FRAME_SAMPLES);
        // Frame order must survive the handoff
        assert_eq!(samples[0], 0);
        assert_eq!(samples[FRAME_SAMPLES], 1);
        assert_eq!(samples[2 * FRAME_SAMPLES], 2);
    }

    #[test]
    fn encode_empty_session_yields_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.wav");

        let artifact = finalize_wav(RecordedAudio::from_frames(Vec::new(), 44_100), &path).unwrap();

        assert!(artifact.is_none());
        assert!(!path.exists());
    }

    #[test]
    fn encode_duration_follows_sample_rate() {
        let audio = synthetic_audio(10, 16_000);
        assert_eq!(audio.duration_secs(), (10 * FRAME_SAMPLES) as f64 / 16000.0);
    }
}

// ============================================================================
// Capture Tests - Require a working input device
// ============================================================================

mod capture_tests {
    use super::*;
    use consult_scribe::audio::start_capture;
    use std::time::Duration;

    #[test]
    fn capture_frames_are_always_full_size() {
        let handle = match start_capture(44_100) {
            Ok(handle) => handle,
            Err(AudioError::DeviceUnavailable(e)) => {
                eprintln!("Skipping capture_frames_are_always_full_size: {}", e);
                return;
            }
            Err(e) => panic!("unexpected capture error: {}", e),
        };

        std::thread::sleep(Duration::from_millis(300));
        let recorded = handle.stop();

        for frame in recorded.frames() {
            assert_eq!(frame.len(), FRAME_SAMPLES);
        }
        assert_eq!(
            recorded.total_samples(),
            recorded.frames().len() * FRAME_SAMPLES
        );
        assert_eq!(
            recorded.duration_secs(),
            recorded.total_samples() as f64 / 44100.0
        );
    }

    #[test]
    fn capture_stop_is_single_use_and_immediate() {
        let handle = match start_capture(44_100) {
            Ok(handle) => handle,
            Err(AudioError::DeviceUnavailable(e)) => {
                eprintln!("Skipping capture_stop_is_single_use_and_immediate: {}", e);
                return;
            }
            Err(e) => panic!("unexpected capture error: {}", e),
        };

        // stop() consumes the handle, so a second stop cannot compile
        let recorded = handle.stop();
        assert!(recorded.device_error().is_none());
    }
}

// ============================================================================
// ffmpeg Tests - Require ffmpeg on PATH
// ============================================================================

mod ffmpeg_tests {
    use super::*;

    #[test]
    fn ffmpeg_transcode_produces_webm_artifact() {
        if !ffmpeg_available() {
            eprintln!("Skipping ffmpeg_transcode_produces_webm_artifact: ffmpeg not found");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.webm");

        let artifact = finalize_compressed(synthetic_audio(43, 44_100), &path, 32)
            .unwrap()
            .expect("43 frames are not an empty session");

        assert_eq!(artifact.path, path);
        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
        assert_eq!(artifact.duration_secs, (43 * FRAME_SAMPLES) as f64 / 44100.0);
    }

    #[test]
    fn ffmpeg_empty_session_skips_transcode() {
        // No ffmpeg needed: the empty check comes first
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.webm");

        let artifact =
            finalize_compressed(RecordedAudio::from_frames(Vec::new(), 44_100), &path, 32).unwrap();

        assert!(artifact.is_none());
        assert!(!path.exists());
    }
}

// ============================================================================
// Mock Tests - OpenAI clients against a local mock server
// ============================================================================

mod mock_tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn mock_transcribe_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "Doctor: how are you feeling today?"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("consult.wav");
        write_silence_wav(&wav, 1);

        let client = TranscriptionClient::new("sk-test")
            .with_api_url(format!("{}/v1/audio/transcriptions", server.uri()));
        let text = client
            .transcribe(&wav, Some("This is a medical consultation recording."))
            .await
            .unwrap();

        assert_eq!(text, "Doctor: how are you feeling today?");

        // The multipart body must carry the model and the context prompt
        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body).to_string();
        assert!(body.contains("whisper-1"));
        assert!(body.contains("This is a medical consultation recording."));
    }

    #[tokio::test]
    async fn mock_transcribe_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "message": "Incorrect API key provided" }
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("consult.wav");
        write_silence_wav(&wav, 1);

        let client = TranscriptionClient::new("sk-bad")
            .with_api_url(format!("{}/v1/audio/transcriptions", server.uri()));
        let err = client.transcribe(&wav, None).await.unwrap_err();

        match err {
            TranscriptionError::ApiError { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("Incorrect API key"));
            }
            other => panic!("expected ApiError, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn mock_transcribe_bad_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("consult.wav");
        write_silence_wav(&wav, 1);

        let client = TranscriptionClient::new("sk-test")
            .with_api_url(format!("{}/v1/audio/transcriptions", server.uri()));
        let err = client.transcribe(&wav, None).await.unwrap_err();

        assert!(matches!(err, TranscriptionError::ParseError(_)));
    }

    #[tokio::test]
    async fn mock_transcribe_missing_file_fails_before_network() {
        // Default API URL: a send would fail, but the file read fails first
        let client = TranscriptionClient::new("sk-test");
        let missing = PathBuf::from("/tmp/this_file_does_not_exist_54321.wav");

        let err = client.transcribe(&missing, None).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::FileReadError(_)));
    }

    #[tokio::test]
    async fn mock_completion_returns_trimmed_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({ "model": "o3" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    { "message": { "content": "  migraine, tension headache \n" } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CompletionClient::new("sk-test")
            .with_api_url(format!("{}/v1/chat/completions", server.uri()));
        let reply = client
            .ask("List the diagnoses.", "Doctor: looks like a migraine.")
            .await
            .unwrap();

        assert_eq!(reply, "migraine, tension headache");
    }

    #[tokio::test]
    async fn mock_completion_surfaces_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "Rate limit reached", "code": "rate_limit_exceeded" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CompletionClient::new("sk-test")
            .with_api_url(format!("{}/v1/chat/completions", server.uri()));
        let err = client.ask("system", "user").await.unwrap_err();

        match err {
            CompletionError::ApiError { status, message } => {
                assert_eq!(status, 429);
                assert!(message.contains("Rate limit reached"));
                assert!(message.contains("rate_limit_exceeded"));
            }
            other => panic!("expected ApiError, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn mock_completion_empty_choices_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let client = CompletionClient::new("sk-test")
            .with_api_url(format!("{}/v1/chat/completions", server.uri()));
        let err = client.ask("system", "user").await.unwrap_err();

        assert!(matches!(err, CompletionError::EmptyResponse));
    }

    #[tokio::test]
    async fn mock_notes_patient_info_parses_fenced_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    { "message": { "content": "```json\n{\"name\": \"unknown\", \"age\": \"52 years\"}\n```" } }
                ]
            })))
            .mount(&server)
            .await;

        let client = CompletionClient::new("sk-test")
            .with_api_url(format!("{}/v1/chat/completions", server.uri()));
        let results = generate_notes(
            &client,
            "Doctor: hello.",
            125.0,
            &[NoteKind::PatientInfo],
            None,
        )
        .await;

        assert_eq!(results.len(), 1);
        match &results[0] {
            NoteResult::Complete(note) => {
                assert_eq!(note.kind, NoteKind::PatientInfo);
                let value = note.structured.as_ref().expect("fenced JSON should parse");
                assert_eq!(value["age"], "52 years");
                assert_eq!(note.file_name(), "patient-info.json");
            }
            other => panic!("expected Complete, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn mock_notes_all_kinds_complete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [ { "message": { "content": "none" } } ]
            })))
            .expect(5)
            .mount(&server)
            .await;

        let client = CompletionClient::new("sk-test")
            .with_api_url(format!("{}/v1/chat/completions", server.uri()));
        let results = generate_notes(&client, "Doctor: hello.", 60.0, NoteKind::all(), None).await;

        assert_eq!(results.len(), 5);
        for (result, kind) in results.iter().zip(NoteKind::all()) {
            match result {
                NoteResult::Complete(note) => assert_eq!(note.kind, *kind),
                other => panic!("expected Complete for {:?}, got: {:?}", kind, other),
            }
        }
    }

    #[tokio::test]
    async fn mock_notes_one_failure_keeps_the_rest() {
        let server = MockServer::start().await;
        // First call fails, the remaining four succeed
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "message": "The server had an error" }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [ { "message": { "content": "none" } } ]
            })))
            .mount(&server)
            .await;

        let client = CompletionClient::new("sk-test")
            .with_api_url(format!("{}/v1/chat/completions", server.uri()));
        let results = generate_notes(&client, "Doctor: hello.", 60.0, NoteKind::all(), None).await;

        assert_eq!(results.len(), 5);
        match &results[0] {
            NoteResult::Failed { kind, error } => {
                assert_eq!(*kind, NoteKind::PatientInfo);
                assert!(matches!(error, CompletionError::ApiError { status: 500, .. }));
            }
            other => panic!("expected first note to fail, got: {:?}", other),
        }
        let completed = results
            .iter()
            .filter(|r| matches!(r, NoteResult::Complete(_)))
            .count();
        assert_eq!(completed, 4);
    }
}

// ============================================================================
// Integration Tests - Hit the real API, require an API key
// ============================================================================

mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn integration_transcribe_silence() {
        if !is_api_key_configured() {
            eprintln!("Skipping integration_transcribe_silence: OPENAI_API_KEY not set");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("silence.wav");
        write_silence_wav(&wav, 1);

        let key = std::env::var("OPENAI_API_KEY").unwrap();
        let client = TranscriptionClient::new(key);
        let result = client.transcribe(&wav, None).await;

        // Whisper often returns empty or near-empty text for silence
        assert!(
            result.is_ok(),
            "Transcription should succeed for silence: {:?}",
            result.err()
        );
        println!("Silence transcription result: '{}'", result.unwrap());
    }
}

// ============================================================================
// Error Case Tests
// ============================================================================

mod error_case_tests {
    use super::*;
    use consult_scribe::config::ConfigError;
    use consult_scribe::files::FileError;
    use consult_scribe::ScribeError;

    #[test]
    fn error_case_display_formats_correctly() {
        let errors: Vec<(Box<dyn std::error::Error>, &str)> = vec![
            (
                Box::new(AudioError::DeviceUnavailable("no input device".to_string())),
                "no input device",
            ),
            (
                Box::new(AudioError::EncodeFailed("ffmpeg exited with 1".to_string())),
                "ffmpeg",
            ),
            (
                Box::new(TranscriptionError::NetworkError(
                    "connection refused".to_string(),
                )),
                "connection refused",
            ),
            (
                Box::new(CompletionError::ApiError {
                    status: 500,
                    message: "server error".to_string(),
                }),
                "500",
            ),
            (Box::new(ConfigError::MissingApiKey), "OPENAI_API_KEY"),
            (
                Box::new(FileError::Read {
                    path: PathBuf::from("/tmp/x.txt"),
                    message: "denied".to_string(),
                }),
                "denied",
            ),
        ];

        for (err, expected_substring) in errors {
            let display = err.to_string();
            assert!(
                display.contains(expected_substring),
                "Error display '{}' should contain '{}'",
                display,
                expected_substring
            );
        }
    }

    #[test]
    fn error_case_wrapper_keeps_inner_message() {
        let err = ScribeError::from(CompletionError::EmptyResponse);
        assert_eq!(err.to_string(), "Empty response from API");
    }

    #[test]
    fn error_case_all_error_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}

        assert_send_sync::<AudioError>();
        assert_send_sync::<TranscriptionError>();
        assert_send_sync::<CompletionError>();
        assert_send_sync::<ConfigError>();
        assert_send_sync::<FileError>();
        assert_send_sync::<ScribeError>();
    }
}
