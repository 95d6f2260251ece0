//! Voice and telephony collaborators for the parley platform.
//!
//! Provides STT (speech-to-text) transcription and TTS (text-to-speech)
//! synthesis via local process-spawned engines, the telephony provider
//! client for outbound call placement, and the voice-response document
//! builder used by webhook handlers.
//!
//! Everything here is thin I/O glue: the conversation logic lives in
//! `parley-core` and treats these services as external capabilities.

pub mod error;
pub mod stt;
pub mod telephony;
pub mod tts;

pub use error::VoiceError;
pub use stt::SttService;
pub use telephony::{TelephonyClient, TelephonyConfig, VoiceResponse};
pub use tts::TtsService;
