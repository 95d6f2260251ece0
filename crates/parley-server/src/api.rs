//! JSON chat API handlers.

use crate::AppState;
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use parley_core::CallerIdentity;
use parley_types::EmotionTags;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Request body for `POST /api/chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The caller utterance. Required.
    pub query: String,
    /// Primary identity field (email or phone).
    #[serde(default)]
    pub contact: Option<String>,
    /// Secondary identity field (account or callback number).
    #[serde(default)]
    pub secondary: Option<String>,
    /// Conversation id; defaults to the identity key, or a fresh random
    /// session when no identity is given.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Response body for `POST /api/chat`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub emotion_detected: EmotionTags,
    pub timestamp: DateTime<Utc>,
    /// Present when the completion backend failed and `response` is the
    /// fallback utterance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub(crate) fn identity_from_fields(
    contact: Option<&str>,
    secondary: Option<&str>,
) -> Option<CallerIdentity> {
    let contact = contact?.trim();
    if contact.is_empty() {
        return None;
    }
    Some(CallerIdentity {
        contact: contact.to_string(),
        secondary: secondary.unwrap_or_default().trim().to_string(),
        phone: None,
    })
}

/// Handler for `POST /api/chat`.
///
/// Upstream completion failure is not a transport error here: the handler
/// still returns 200 with the fallback `response`, and the `error` field
/// carries the failure class for programmatic callers.
pub async fn chat_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if payload.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query is required".to_string()));
    }

    let identity = identity_from_fields(payload.contact.as_deref(), payload.secondary.as_deref());
    let session_id = payload
        .session_id
        .clone()
        .or_else(|| identity.as_ref().map(|id| id.key()))
        // Unidentified callers must not share one conversation.
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let outcome = state
        .orchestrator
        .handle_turn(&payload.query, identity.as_ref(), &session_id)
        .await;

    Ok(Json(ChatResponse {
        response: outcome.response,
        emotion_detected: outcome.emotion,
        timestamp: outcome.timestamp,
        error: outcome.upstream_error,
    }))
}
