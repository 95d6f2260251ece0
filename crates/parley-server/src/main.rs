//! Parley server binary — voice/text customer-service agent.
//!
//! Starts an axum HTTP server with structured logging, JSON record stores,
//! the background session reaper, and graceful shutdown on SIGTERM/SIGINT.

use parley_core::{
    CallStore, CompletionConfig, CustomerStore, DialogueOrchestrator, EmotionClassifier,
    OpenAiChatClient, ReferenceDocument, SessionConfig, SessionStore,
};
use parley_server::{app, background, config, AppState};
use parley_voice::{SttService, TelephonyClient, TelephonyConfig, TtsService};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("PARLEY_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Conversation core
    let sessions = SessionStore::new(SessionConfig {
        timeout: Duration::from_secs(config.session.timeout_secs),
        max_turns: config.session.max_turns,
    });
    let completion = OpenAiChatClient::new(CompletionConfig {
        base_url: config.completion.base_url.clone(),
        api_key: config.completion.api_key.clone(),
        model: config.completion.model.clone(),
        max_tokens: config.completion.max_tokens,
        request_timeout: Duration::from_secs(config.completion.timeout_secs),
    })
    .expect("failed to build completion client — check the [completion] config section");

    let orchestrator = DialogueOrchestrator::new(
        sessions,
        CustomerStore::new(&config.storage.customers_path),
        CallStore::new(&config.storage.calls_path),
        EmotionClassifier::default(),
        Arc::new(completion),
        ReferenceDocument::load(&config.storage.reference_path),
    );

    // Voice collaborators
    let stt = SttService::new(&config.voice.stt_binary_path, &config.voice.stt_model_path);
    let tts = TtsService::new(
        &config.voice.tts_binary_path,
        &config.voice.tts_model_path,
        config.voice.tts_speed,
    )
    .expect("invalid [voice] config — check tts_speed");
    let telephony = TelephonyClient::new(TelephonyConfig {
        api_url: config.telephony.api_url.clone(),
        account_sid: config.telephony.account_sid.clone(),
        auth_token: config.telephony.auth_token.clone(),
        from_number: config.telephony.from_number.clone(),
        webhook_url: config.telephony.webhook_url.clone(),
    })
    .expect("failed to build telephony client");

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        stt: Arc::new(stt),
        tts: Arc::new(tts),
        telephony: Arc::new(telephony),
    };

    // Background session reaper
    tokio::spawn(background::start_session_reaper(
        Arc::new(state.clone()),
        config.session.reap_idle_secs,
    ));

    // Build application
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting parley server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("parley server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
