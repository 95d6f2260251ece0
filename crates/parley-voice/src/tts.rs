use crate::error::VoiceError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Maximum text input size for synthesis (64 KiB). Prevents resource
/// exhaustion from oversized requests.
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Timeout for synthesis process execution.
const SYNTHESIZE_TIMEOUT: Duration = Duration::from_secs(60);

/// Text-to-speech collaborator backed by a local piper-style binary.
///
/// Returns raw PCM audio (s16le, sample rate per model, typically 22050Hz).
#[derive(Debug, Clone)]
pub struct TtsService {
    binary_path: PathBuf,
    model_path: PathBuf,
    /// Speech speed multiplier (1.0 is normal).
    speed: f32,
}

impl TtsService {
    pub fn new(
        binary_path: impl Into<PathBuf>,
        model_path: impl Into<PathBuf>,
        speed: f32,
    ) -> Result<Self, VoiceError> {
        if !(0.1..=10.0).contains(&speed) {
            return Err(VoiceError::Config(
                "speed must be between 0.1 and 10.0".to_string(),
            ));
        }
        Ok(Self {
            binary_path: binary_path.into(),
            model_path: model_path.into(),
            speed,
        })
    }

    /// Synthesizes speech for `text`, returning raw PCM bytes.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, VoiceError> {
        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(VoiceError::Tts(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_TTS_INPUT_BYTES
            )));
        }

        if !Path::new(&self.model_path).exists() {
            return Err(VoiceError::Tts(format!(
                "voice model not found: {:?}",
                self.model_path
            )));
        }

        let mut command = Command::new(&self.binary_path);
        command
            .arg("--model")
            .arg(&self.model_path)
            .arg("--output_raw")
            // Length scale is roughly the inverse of speed.
            .arg("--length_scale")
            .arg((1.0 / self.speed).to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| VoiceError::Tts(format!("failed to spawn TTS binary: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceError::Tts("failed to open stdin".to_string()))?;
        let text_owned = text.to_string();

        // Write from a task so a filled stdout pipe cannot deadlock us.
        let write_task = tokio::spawn(async move { stdin.write_all(text_owned.as_bytes()).await });

        let output = tokio::time::timeout(SYNTHESIZE_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Tts(format!(
                    "TTS process timed out after {} seconds",
                    SYNTHESIZE_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| VoiceError::Tts(format!("failed to wait for TTS binary: {e}")))?;

        match write_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(VoiceError::Tts(format!("failed to write TTS stdin: {e}")));
            }
            Err(e) => return Err(VoiceError::Tts(format!("stdin writer task failed: {e}"))),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Tts(format!("TTS binary failed: {stderr}")));
        }

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_speed() {
        assert!(TtsService::new("piper", "voice.onnx", 0.0).is_err());
        assert!(TtsService::new("piper", "voice.onnx", 20.0).is_err());
        assert!(TtsService::new("piper", "voice.onnx", 1.0).is_ok());
    }

    #[tokio::test]
    async fn rejects_oversized_text() {
        let tts = TtsService::new("piper", "voice.onnx", 1.0).unwrap();
        let text = "a".repeat(MAX_TTS_INPUT_BYTES + 1);
        let err = tts.synthesize(&text).await.unwrap_err();
        assert!(err.to_string().contains("maximum size"));
    }
}
