use crate::error::VoiceError;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Maximum audio input size for transcription (10 MiB). Prevents OOM from
/// oversized payloads.
const MAX_AUDIO_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Timeout for transcription process execution.
const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(120);

/// Speech-to-text collaborator backed by a local whisper.cpp-style binary.
///
/// Audio is streamed over stdin and the transcript read from stdout; the
/// service itself keeps no state between calls.
#[derive(Debug, Clone)]
pub struct SttService {
    binary_path: PathBuf,
    model_path: PathBuf,
}

impl SttService {
    pub fn new(binary_path: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            model_path: model_path.into(),
        }
    }

    /// Transcribes an audio payload to text.
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String, VoiceError> {
        if audio.len() > MAX_AUDIO_INPUT_BYTES {
            return Err(VoiceError::Stt(format!(
                "audio payload exceeds maximum size: {} bytes (limit: {} bytes)",
                audio.len(),
                MAX_AUDIO_INPUT_BYTES
            )));
        }

        let mut command = Command::new(&self.binary_path);
        // whisper.cpp convention: -m <model>, -f - reads audio from stdin,
        // transcript goes to stdout.
        command
            .arg("-m")
            .arg(&self.model_path)
            .arg("-f")
            .arg("-")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| VoiceError::Stt(format!("failed to spawn STT binary: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceError::Stt("failed to open stdin".to_string()))?;
        stdin
            .write_all(audio)
            .await
            .map_err(|e| VoiceError::Stt(format!("failed to write audio to stdin: {e}")))?;
        drop(stdin); // close stdin to signal EOF

        let output = tokio::time::timeout(TRANSCRIBE_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Stt(format!(
                    "STT process timed out after {} seconds",
                    TRANSCRIBE_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| VoiceError::Stt(format!("failed to read STT output: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Stt(format!("STT binary failed: {stderr}")));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
