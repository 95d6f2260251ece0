use async_trait::async_trait;
use parley_core::{
    CallerIdentity, CompletionClient, CoreError, DialogueOrchestrator, EmotionClassifier,
    ReferenceDocument, SessionConfig, SessionStore, CallStore, CustomerStore, FALLBACK_RESPONSE,
};
use parley_types::{ChatMessage, Role};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Scripted completion backend: echoes the final user message, or fails on
/// demand.
struct ScriptedClient {
    fail: AtomicBool,
}

impl ScriptedClient {
    fn new() -> Self {
        Self {
            fail: AtomicBool::new(false),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoreError::Completion("simulated upstream outage".to_string()));
        }
        let last = messages.last().expect("messages never empty");
        Ok(format!("echo: {}", last.content))
    }
}

fn orchestrator_with(
    dir: &TempDir,
    client: Arc<ScriptedClient>,
    timeout: Duration,
) -> DialogueOrchestrator {
    DialogueOrchestrator::new(
        SessionStore::new(SessionConfig {
            timeout,
            max_turns: 20,
        }),
        CustomerStore::new(dir.path().join("customers.json")),
        CallStore::new(dir.path().join("calls.json")),
        EmotionClassifier::default(),
        client,
        ReferenceDocument::from_text("Opening hours: 9-5"),
    )
}

fn identity() -> CallerIdentity {
    CallerIdentity {
        contact: "alice@example.com".to_string(),
        secondary: "555-0100".to_string(),
        phone: Some("+15550100".to_string()),
    }
}

#[tokio::test]
async fn first_turn_stores_exchange_and_persists_customer_record() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let orchestrator = orchestrator_with(&dir, client, Duration::from_secs(300));
    let id = identity();

    let outcome = orchestrator
        .handle_turn("when do you open?", Some(&id), "CA-1")
        .await;

    assert_eq!(outcome.response, "echo: when do you open?");
    assert!(outcome.upstream_error.is_none());

    let session = orchestrator.sessions().get_or_create("CA-1");
    assert_eq!(session.turns.len(), 2);
    assert_eq!(session.turns[0].role, Role::User);
    assert_eq!(session.turns[1].role, Role::Assistant);

    let customers = CustomerStore::new(dir.path().join("customers.json"));
    assert_eq!(customers.get(&id.key()).interaction_count, 1);
}

#[tokio::test]
async fn second_turn_within_timeout_accumulates_history() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let orchestrator = orchestrator_with(&dir, client, Duration::from_secs(300));
    let id = identity();

    orchestrator.handle_turn("first", Some(&id), "CA-1").await;
    orchestrator.handle_turn("second", Some(&id), "CA-1").await;

    assert_eq!(orchestrator.sessions().get_or_create("CA-1").turns.len(), 4);
    let customers = CustomerStore::new(dir.path().join("customers.json"));
    assert_eq!(customers.get(&id.key()).interaction_count, 2);
}

#[tokio::test]
async fn turn_after_timeout_starts_from_that_turn_alone() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let orchestrator = orchestrator_with(&dir, client, Duration::from_millis(20));
    let id = identity();

    orchestrator.handle_turn("first", Some(&id), "CA-1").await;
    orchestrator.handle_turn("second", Some(&id), "CA-1").await;
    tokio::time::sleep(Duration::from_millis(40)).await;

    orchestrator.handle_turn("third", Some(&id), "CA-1").await;

    let session = orchestrator.sessions().get_or_create("CA-1");
    assert_eq!(session.turns.len(), 2);
    assert_eq!(session.turns[0].content, "third");
}

#[tokio::test]
async fn completion_failure_yields_fallback_and_leaves_history_intact() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let orchestrator = orchestrator_with(&dir, client.clone(), Duration::from_secs(300));
    let id = identity();

    orchestrator.handle_turn("works", Some(&id), "CA-1").await;
    client.set_failing(true);
    let outcome = orchestrator.handle_turn("broken", Some(&id), "CA-1").await;

    assert_eq!(outcome.response, FALLBACK_RESPONSE);
    assert!(outcome
        .upstream_error
        .as_deref()
        .unwrap()
        .contains("simulated upstream outage"));

    // The failed exchange is not appended and the prior one survives.
    let session = orchestrator.sessions().get_or_create("CA-1");
    assert_eq!(session.turns.len(), 2);
    assert_eq!(session.turns[0].content, "works");

    // Repeated failures keep returning the fallback without corrupting state.
    for _ in 0..3 {
        let outcome = orchestrator.handle_turn("still broken", Some(&id), "CA-1").await;
        assert_eq!(outcome.response, FALLBACK_RESPONSE);
    }
    assert_eq!(orchestrator.sessions().get_or_create("CA-1").turns.len(), 2);
}

#[tokio::test]
async fn call_records_tally_emotion_per_turn() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let orchestrator = orchestrator_with(&dir, client, Duration::from_secs(300));
    let id = identity();

    orchestrator
        .handle_turn("THIS IS TERRIBLE!!!", Some(&id), "CA-9")
        .await;
    orchestrator
        .handle_turn("thanks, that's great", Some(&id), "CA-9")
        .await;

    let history = CallStore::new(dir.path().join("calls.json")).load();
    assert_eq!(history.calls.len(), 1);
    let call = &history.calls[0];
    assert_eq!(call.call_id, "CA-9");
    assert_eq!(call.turn_count, 2);
    assert_eq!(call.emotion_tally.angry, 1);
    assert_eq!(call.emotion_tally.shouting, 1);
    assert_eq!(call.emotion_tally.positive, 1);
    assert_eq!(call.phone_number.as_deref(), Some("+15550100"));
    assert_eq!(history.stats.total_calls, 1);
    assert_eq!(history.stats.angry_calls, 1);
}

#[tokio::test(flavor = "current_thread")]
async fn turns_persist_records_even_on_a_single_threaded_runtime() {
    // Record I/O is offloaded to blocking threads; a lone async worker must
    // still drive turns to completion without deadlocking on its own disk
    // writes.
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let orchestrator = orchestrator_with(&dir, client, Duration::from_secs(300));
    let id = identity();

    orchestrator.handle_turn("first", Some(&id), "CA-1").await;
    orchestrator.handle_turn("second", Some(&id), "CA-1").await;

    let customers = CustomerStore::new(dir.path().join("customers.json"));
    assert_eq!(customers.get(&id.key()).interaction_count, 2);
    let history = CallStore::new(dir.path().join("calls.json")).load();
    assert_eq!(history.calls.len(), 1);
    assert_eq!(history.calls[0].turn_count, 2);
}

#[tokio::test]
async fn anonymous_turns_skip_customer_records_but_keep_call_records() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let orchestrator = orchestrator_with(&dir, client, Duration::from_secs(300));

    let outcome = orchestrator.handle_turn("hello", None, "CA-2").await;
    assert_eq!(outcome.response, "echo: hello");

    let customers = CustomerStore::new(dir.path().join("customers.json"));
    assert!(customers.load().is_empty());
    let history = CallStore::new(dir.path().join("calls.json")).load();
    assert_eq!(history.calls.len(), 1);
}
