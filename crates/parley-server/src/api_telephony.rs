//! Telephony webhook handlers and the outbound-call trigger.

use crate::api::ApiError;
use crate::AppState;
use axum::{
    extract::{Extension, Form, Json},
    http::header,
    response::{IntoResponse, Response},
};
use parley_core::CallerIdentity;
use parley_voice::VoiceResponse;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Path the provider POSTs gathered speech/digits back to.
const INPUT_ACTION: &str = "/voice/input";

const GREETING: &str = "Hello, thank you for calling. How can I help you today?";
const REPROMPT: &str = "Sorry, I didn't catch that. Could you say it again?";

fn xml_response(xml: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], xml).into_response()
}

/// Webhook fields posted by the provider on call events. Field names follow
/// the provider's PascalCase convention.
#[derive(Debug, Deserialize)]
pub struct WebhookParams {
    #[serde(rename = "CallSid", default)]
    pub call_sid: Option<String>,
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    #[serde(rename = "SpeechResult", default)]
    pub speech_result: Option<String>,
    #[serde(rename = "Digits", default)]
    pub digits: Option<String>,
}

/// Handler for `POST /voice/incoming`.
///
/// Answers a new inbound call with a greeting and a gather that POSTs the
/// caller's speech or DTMF back to [`INPUT_ACTION`].
pub async fn incoming_call_handler(Form(params): Form<WebhookParams>) -> Response {
    info!(
        call_sid = params.call_sid.as_deref().unwrap_or("unknown"),
        from = params.from.as_deref().unwrap_or("unknown"),
        "incoming call"
    );
    let xml = VoiceResponse::new()
        .gather(INPUT_ACTION, Some(GREETING))
        .to_xml();
    xml_response(xml)
}

/// Handler for `POST /voice/input`.
///
/// Runs the gathered utterance through the dialogue pipeline keyed by the
/// provider call id, speaks the reply, and gathers again. Empty input gets
/// a re-prompt instead of a model round trip.
pub async fn voice_input_handler(
    Extension(state): Extension<Arc<AppState>>,
    Form(params): Form<WebhookParams>,
) -> Response {
    let input = params
        .speech_result
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .or(params.digits.as_deref())
        .unwrap_or("")
        .trim()
        .to_string();

    if input.is_empty() {
        let xml = VoiceResponse::new()
            .gather(INPUT_ACTION, Some(REPROMPT))
            .to_xml();
        return xml_response(xml);
    }

    // A missing CallSid must not funnel distinct calls into one session.
    let session_id = params
        .call_sid
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let identity = params.from.as_deref().map(|from| CallerIdentity {
        contact: from.to_string(),
        secondary: String::new(),
        phone: Some(from.to_string()),
    });

    let outcome = state
        .orchestrator
        .handle_turn(&input, identity.as_ref(), &session_id)
        .await;

    // Voice callers always get speakable text; the fallback utterance
    // already covers upstream failure.
    let xml = VoiceResponse::new()
        .say(&outcome.response)
        .gather(INPUT_ACTION, None)
        .to_xml();
    xml_response(xml)
}

/// Request body for `POST /api/calls`.
#[derive(Debug, Deserialize)]
pub struct PlaceCallRequest {
    pub to: String,
}

/// Response body for `POST /api/calls`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaceCallResponse {
    pub call_id: String,
}

/// Handler for `POST /api/calls`: places an outbound call via the provider.
pub async fn place_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<PlaceCallRequest>,
) -> Result<Json<PlaceCallResponse>, ApiError> {
    if payload.to.trim().is_empty() {
        return Err(ApiError::BadRequest("destination number is required".to_string()));
    }

    let call_id = state
        .telephony
        .place_call(payload.to.trim())
        .await
        .map_err(|e| ApiError::InternalServerError(e.to_string()))?;

    Ok(Json(PlaceCallResponse { call_id }))
}
