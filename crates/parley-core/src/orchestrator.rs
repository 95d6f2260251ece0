//! Per-turn dialogue pipeline tying sessions, records, and the completion
//! backend together.

use crate::classify::EmotionClassifier;
use crate::completion::CompletionClient;
use crate::prompt::PromptComposer;
use crate::reference::ReferenceDocument;
use crate::session::SessionStore;
use crate::store::{key_for, CallStore, CustomerStore};
use chrono::{DateTime, Utc};
use parley_types::{EmotionTags, Role};
use std::sync::Arc;
use tracing::{error, info};

/// Spoken to the caller when the completion backend fails. A phone caller
/// must never hear a raw internal error.
pub const FALLBACK_RESPONSE: &str =
    "I'm sorry, I'm having trouble processing that right now. Could you please repeat that, \
     or try again in a moment?";

/// Maximum length of a stored per-customer exchange digest.
const SUMMARY_MAX_CHARS: usize = 200;

/// Who is calling, when the channel knows.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    /// Primary contact field (email or phone number).
    pub contact: String,
    /// Secondary identifier (account number, callback number, ...).
    pub secondary: String,
    /// Caller phone number for call records, when distinct from contact.
    pub phone: Option<String>,
}

impl CallerIdentity {
    /// Stable storage key for this identity.
    pub fn key(&self) -> String {
        key_for(&self.contact, &self.secondary)
    }
}

/// Result of one handled turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response: String,
    pub emotion: EmotionTags,
    pub timestamp: DateTime<Utc>,
    /// Set when the completion backend failed and `response` is the
    /// fallback utterance. API callers surface this as a structured error
    /// field; voice flows just speak the fallback.
    pub upstream_error: Option<String>,
}

/// Orchestrates the per-turn pipeline:
/// expiry check, classification, prompt composition, completion, and
/// session/record updates.
pub struct DialogueOrchestrator {
    sessions: SessionStore,
    customers: Arc<CustomerStore>,
    calls: Arc<CallStore>,
    classifier: EmotionClassifier,
    composer: PromptComposer,
    completion: Arc<dyn CompletionClient>,
    reference: ReferenceDocument,
}

impl DialogueOrchestrator {
    pub fn new(
        sessions: SessionStore,
        customers: CustomerStore,
        calls: CallStore,
        classifier: EmotionClassifier,
        completion: Arc<dyn CompletionClient>,
        reference: ReferenceDocument,
    ) -> Self {
        Self {
            sessions,
            customers: Arc::new(customers),
            calls: Arc::new(calls),
            classifier,
            composer: PromptComposer,
            completion,
            reference,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handles one inbound utterance for a session.
    ///
    /// A completion failure is converted into the fallback response rather
    /// than propagated; existing session history stays intact and the failed
    /// exchange is not recorded.
    pub async fn handle_turn(
        &self,
        input: &str,
        identity: Option<&CallerIdentity>,
        session_id: &str,
    ) -> TurnOutcome {
        // Expired sessions start over with empty history. Hard boundary.
        if self.sessions.is_expired(session_id) {
            info!(session_id, "session expired, resetting");
            self.sessions.reset(session_id);
        }

        let emotion = self.classifier.classify(input);

        // Store access is whole-file disk I/O; keep it off the async workers.
        let customer = match identity {
            Some(id) => {
                let customers = Arc::clone(&self.customers);
                let key = id.key();
                match tokio::task::spawn_blocking(move || customers.get(&key)).await {
                    Ok(record) => Some(record),
                    Err(e) => {
                        error!(session_id, "customer lookup task failed: {}", e);
                        None
                    }
                }
            }
            None => None,
        };
        let session = self.sessions.get_or_create(session_id);

        let messages = self.composer.compose(
            self.reference.text(),
            customer.as_ref(),
            &session.turns,
            &emotion,
            input,
        );

        let timestamp = Utc::now();
        let reply = match self.completion.complete(&messages).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(session_id, "completion failed, returning fallback: {}", e);
                return TurnOutcome {
                    response: FALLBACK_RESPONSE.to_string(),
                    emotion,
                    timestamp,
                    upstream_error: Some(e.to_string()),
                };
            }
        };

        self.sessions.append_turn(session_id, Role::User, input);
        self.sessions
            .append_turn(session_id, Role::Assistant, reply.clone());

        if let Some(identity) = identity {
            let customers = Arc::clone(&self.customers);
            let key = identity.key();
            let phone = identity.phone.clone();
            let summary = exchange_summary(input, &reply);
            if let Err(e) = tokio::task::spawn_blocking(move || {
                customers.update(&key, summary, phone);
            })
            .await
            {
                error!(session_id, "customer record task failed: {}", e);
            }
        }

        let calls = Arc::clone(&self.calls);
        let call_id = session_id.to_string();
        let phone = identity.and_then(|id| id.phone.clone());
        if let Err(e) = tokio::task::spawn_blocking(move || {
            calls.record_turn(&call_id, phone.as_deref(), &emotion);
        })
        .await
        {
            error!(session_id, "call record task failed: {}", e);
        }

        TurnOutcome {
            response: reply,
            emotion,
            timestamp,
            upstream_error: None,
        }
    }
}

/// One-line digest of an exchange for the customer history.
fn exchange_summary(input: &str, reply: &str) -> String {
    let mut summary = format!("{} -> {}", input.trim(), reply.trim());
    if summary.chars().count() > SUMMARY_MAX_CHARS {
        summary = summary.chars().take(SUMMARY_MAX_CHARS).collect();
    }
    summary
}
