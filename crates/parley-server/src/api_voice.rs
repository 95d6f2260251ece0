//! Audio-in/audio-out chat endpoint.

use crate::api::{identity_from_fields, ApiError};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Extension, Query},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Query parameters for `POST /api/voice/chat`.
#[derive(Debug, Deserialize)]
pub struct VoiceChatParams {
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub secondary: Option<String>,
    /// Conversation id; a fresh UUID per request when omitted.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Handler for `POST /api/voice/chat`.
///
/// Accepts a raw audio body, transcribes it, runs the dialogue pipeline,
/// and returns the synthesized reply as raw PCM. Emotion tags and the
/// timestamp ride in response headers since the body is audio.
pub async fn voice_chat_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<VoiceChatParams>,
    body: Bytes,
) -> Result<Response, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("audio payload is required".to_string()));
    }

    let transcript = state
        .stt
        .transcribe(&body)
        .await
        .map_err(|e| ApiError::InternalServerError(e.to_string()))?;

    if transcript.is_empty() {
        return Err(ApiError::BadRequest(
            "no speech recognized in audio payload".to_string(),
        ));
    }
    info!(chars = transcript.len(), "transcribed voice upload");

    let identity = identity_from_fields(params.contact.as_deref(), params.secondary.as_deref());
    let session_id = params
        .session_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let outcome = state
        .orchestrator
        .handle_turn(&transcript, identity.as_ref(), &session_id)
        .await;

    let audio = state
        .tts
        .synthesize(&outcome.response)
        .await
        .map_err(|e| ApiError::InternalServerError(e.to_string()))?;

    let emotion = serde_json::to_string(&outcome.emotion)
        .map_err(|e| ApiError::InternalServerError(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "audio/l16".to_string()),
            (
                header::HeaderName::from_static("x-parley-emotion"),
                emotion,
            ),
            (
                header::HeaderName::from_static("x-parley-timestamp"),
                outcome.timestamp.to_rfc3339(),
            ),
            (
                header::HeaderName::from_static("x-parley-session"),
                session_id,
            ),
        ],
        audio,
    )
        .into_response())
}
