//! Parley server library logic.

pub mod api;
pub mod api_telephony;
pub mod api_voice;
pub mod background;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use parley_core::DialogueOrchestrator;
use parley_voice::{SttService, TelephonyClient, TtsService};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The per-turn dialogue pipeline.
    pub orchestrator: Arc<DialogueOrchestrator>,
    /// Speech-to-text service.
    pub stt: Arc<SttService>,
    /// Text-to-speech service.
    pub tts: Arc<TtsService>,
    /// Telephony provider client.
    pub telephony: Arc<TelephonyClient>,
}

/// Maximum JSON request body size (2 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Maximum audio upload size (12 MiB; the STT service enforces its own cap
/// below this ceiling).
const MAX_AUDIO_BODY_BYTES: usize = 12 * 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    // The audio endpoint needs a larger body limit than the JSON routes.
    let voice_routes = Router::new()
        .route("/api/voice/chat", post(api_voice::voice_chat_handler))
        .layer(DefaultBodyLimit::max(MAX_AUDIO_BODY_BYTES));

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(api::chat_handler))
        .route("/api/calls", post(api_telephony::place_call_handler))
        .route("/voice/incoming", post(api_telephony::incoming_call_handler))
        .route("/voice/input", post(api_telephony::voice_input_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .merge(voice_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use parley_core::{
        CompletionClient, CoreError, EmotionClassifier, ReferenceDocument, SessionConfig,
        SessionStore, CallStore, CustomerStore,
    };
    use parley_types::ChatMessage;
    use parley_voice::TelephonyConfig;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct EchoClient;

    #[async_trait]
    impl CompletionClient for EchoClient {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CoreError> {
            Ok(format!("echo: {}", messages.last().unwrap().content))
        }
    }

    struct FailingClient;

    #[async_trait]
    impl CompletionClient for FailingClient {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, CoreError> {
            Err(CoreError::Completion("backend down".to_string()))
        }
    }

    fn test_state(dir: &TempDir, completion: Arc<dyn CompletionClient>) -> AppState {
        let orchestrator = DialogueOrchestrator::new(
            SessionStore::new(SessionConfig {
                timeout: Duration::from_secs(300),
                max_turns: 20,
            }),
            CustomerStore::new(dir.path().join("customers.json")),
            CallStore::new(dir.path().join("calls.json")),
            EmotionClassifier::default(),
            completion,
            ReferenceDocument::from_text("Opening hours: 9-5"),
        );
        AppState {
            orchestrator: Arc::new(orchestrator),
            stt: Arc::new(SttService::new("whisper", "model.bin")),
            tts: Arc::new(TtsService::new("piper", "voice.onnx", 1.0).unwrap()),
            telephony: Arc::new(TelephonyClient::new(TelephonyConfig::default()).unwrap()),
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let dir = TempDir::new().unwrap();
        let app = app(test_state(&dir, Arc::new(EchoClient)));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn chat_requires_a_query() {
        let dir = TempDir::new().unwrap();
        let app = app(test_state(&dir, Arc::new(EchoClient)));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/chat")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"query": "  "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "query is required");
    }

    #[tokio::test]
    async fn chat_returns_response_emotion_and_timestamp() {
        let dir = TempDir::new().unwrap();
        let app = app(test_state(&dir, Arc::new(EchoClient)));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/chat")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"query": "THIS IS TERRIBLE!!!", "contact": "alice@example.com", "secondary": "555-0100"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["response"], "echo: THIS IS TERRIBLE!!!");
        assert_eq!(json["emotion_detected"]["is_angry"], true);
        assert_eq!(json["emotion_detected"]["is_shouting"], true);
        assert!(json["timestamp"].is_string());
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn anonymous_chats_get_separate_sessions() {
        let dir = TempDir::new().unwrap();
        let app = app(test_state(&dir, Arc::new(EchoClient)));

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/api/chat")
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from(r#"{"query": "hello"}"#))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        // Each unidentified request gets its own call record, not a shared
        // catch-all session.
        let history = CallStore::new(dir.path().join("calls.json")).load();
        assert_eq!(history.calls.len(), 2);
        assert_ne!(history.calls[0].call_id, history.calls[1].call_id);
    }

    #[tokio::test]
    async fn chat_surfaces_upstream_failure_as_structured_error() {
        let dir = TempDir::new().unwrap();
        let app = app(test_state(&dir, Arc::new(FailingClient)));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/chat")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"query": "hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["response"], parley_core::FALLBACK_RESPONSE);
        assert!(json["error"].as_str().unwrap().contains("backend down"));
    }

    #[tokio::test]
    async fn incoming_call_returns_gather_document() {
        let dir = TempDir::new().unwrap();
        let app = app(test_state(&dir, Arc::new(EchoClient)));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/voice/incoming")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("CallSid=CA123&From=%2B15550100"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/xml"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let xml = String::from_utf8(body.to_vec()).unwrap();
        assert!(xml.contains("<Gather"));
        assert!(xml.contains("action=\"/voice/input\""));
    }

    #[tokio::test]
    async fn voice_input_speaks_reply_and_gathers_again() {
        let dir = TempDir::new().unwrap();
        let app = app(test_state(&dir, Arc::new(EchoClient)));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/voice/input")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(
                        "CallSid=CA123&From=%2B15550100&SpeechResult=what+are+your+hours",
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let xml = String::from_utf8(body.to_vec()).unwrap();
        assert!(xml.contains("<Say>echo: what are your hours</Say>"));
        assert!(xml.contains("<Gather"));
    }

    #[tokio::test]
    async fn voice_input_without_call_sid_gets_separate_sessions() {
        let dir = TempDir::new().unwrap();
        let app = app(test_state(&dir, Arc::new(EchoClient)));

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/voice/input")
                        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                        .body(Body::from("SpeechResult=hello"))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let history = CallStore::new(dir.path().join("calls.json")).load();
        assert_eq!(history.calls.len(), 2);
        assert_ne!(history.calls[0].call_id, history.calls[1].call_id);
    }

    #[tokio::test]
    async fn empty_voice_input_reprompts_without_model_call() {
        let dir = TempDir::new().unwrap();
        // A failing client proves the model is never invoked for empty input.
        let app = app(test_state(&dir, Arc::new(FailingClient)));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/voice/input")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("CallSid=CA123&From=%2B15550100"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let xml = String::from_utf8(body.to_vec()).unwrap();
        // Apostrophes arrive XML-escaped in the spoken prompt.
        assert!(xml.contains("Sorry, I didn&apos;t catch that"));
    }

    #[tokio::test]
    async fn place_call_requires_destination_and_provider() {
        let dir = TempDir::new().unwrap();
        let app = app(test_state(&dir, Arc::new(EchoClient)));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/calls")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"to": ""}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Provider not configured in tests -> 500 with a structured error.
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/calls")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"to": "+15550199"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn voice_chat_rejects_empty_body() {
        let dir = TempDir::new().unwrap();
        let app = app(test_state(&dir, Arc::new(EchoClient)));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/voice/chat")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
