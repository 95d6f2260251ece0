use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("STT error: {0}")]
    Stt(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("Telephony API error: {0}")]
    Telephony(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
