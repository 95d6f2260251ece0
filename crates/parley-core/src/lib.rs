//! Conversation-state core for the parley platform.
//!
//! Holds everything with invariants worth testing: bounded in-memory
//! session history with timeout expiry, whole-file JSON persistence of
//! customer and call records, the keyword emotion classifier, the prompt
//! composer, and the dialogue orchestrator that ties them together per
//! inbound turn. Speech and telephony plumbing lives in `parley-voice`;
//! HTTP routing in `parley-server`.

pub mod classify;
pub mod completion;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod reference;
pub mod session;
pub mod store;

pub use classify::{EmotionClassifier, Lexicon};
pub use completion::{CompletionClient, CompletionConfig, OpenAiChatClient};
pub use error::CoreError;
pub use orchestrator::{CallerIdentity, DialogueOrchestrator, TurnOutcome, FALLBACK_RESPONSE};
pub use prompt::PromptComposer;
pub use reference::ReferenceDocument;
pub use session::{Session, SessionConfig, SessionStore};
pub use store::{key_for, CallHistory, CallStore, CustomerStore};
