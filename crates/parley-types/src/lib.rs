//! Shared types for the parley platform.
//!
//! This crate provides the domain types used across all parley crates:
//! conversation turns, emotion tags, and the persisted customer/call
//! records. No crate in the workspace depends on anything *except*
//! `parley-types` for cross-cutting type definitions, which keeps the
//! dependency graph acyclic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker role for a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The caller (human).
    User,
    /// The agent (model output).
    Assistant,
    /// Instructional context prepended to every completion request.
    System,
}

impl Role {
    /// Returns the wire-format string for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// One role-tagged message within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Wire-shape message for the chat completion API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        }
    }
}

/// Boolean emotion flags derived from keyword matching on caller input.
///
/// All flags are advisory except `is_angry`, `is_shouting`, and `is_urgent`,
/// which additionally condition the composed system prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionTags {
    pub is_angry: bool,
    pub is_frustrated: bool,
    pub is_urgent: bool,
    pub is_positive: bool,
    pub is_confused: bool,
    pub is_abusive: bool,
    pub is_shouting: bool,
    pub has_interruption: bool,
}

/// Persisted per-customer record, keyed by an identity hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// Total number of handled turns for this customer.
    pub interaction_count: u64,
    /// First time this identity was seen.
    pub first_seen: DateTime<Utc>,
    /// Most recent interaction time.
    pub last_seen: DateTime<Utc>,
    /// One-line digests of recent exchanges, oldest first. Bounded to the
    /// most recent [`CUSTOMER_SUMMARY_CAP`] entries.
    #[serde(default)]
    pub summaries: Vec<String>,
    /// Free-form preference fields (channel, language, etc).
    #[serde(default)]
    pub preferences: serde_json::Value,
    /// Caller number, when known.
    #[serde(default)]
    pub phone: Option<String>,
}

/// Maximum number of retained per-customer conversation summaries.
pub const CUSTOMER_SUMMARY_CAP: usize = 10;

impl CustomerRecord {
    /// Initializes a fresh record with all counters zeroed at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            interaction_count: 0,
            first_seen: now,
            last_seen: now,
            summaries: Vec::new(),
            preferences: serde_json::Value::Null,
            phone: None,
        }
    }
}

/// Running per-category counters across a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionTally {
    pub angry: u64,
    pub urgent: u64,
    pub shouting: u64,
    pub positive: u64,
}

impl EmotionTally {
    /// Folds one turn's tags into the tally.
    pub fn record(&mut self, tags: &EmotionTags) {
        if tags.is_angry {
            self.angry += 1;
        }
        if tags.is_urgent {
            self.urgent += 1;
        }
        if tags.is_shouting {
            self.shouting += 1;
        }
        if tags.is_positive {
            self.positive += 1;
        }
    }
}

/// Persisted per-call record, keyed by the provider call id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub turn_count: u64,
    #[serde(default)]
    pub emotion_tally: EmotionTally,
}

impl CallRecord {
    pub fn new(call_id: impl Into<String>, phone_number: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            call_id: call_id.into(),
            phone_number,
            started_at: now,
            last_activity_at: now,
            turn_count: 0,
            emotion_tally: EmotionTally::default(),
        }
    }
}

/// Aggregate statistics recomputed over the full call record set on every
/// update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CallStats {
    pub total_calls: u64,
    pub total_turns: u64,
    pub avg_turns_per_call: f64,
    /// Calls with at least one angry-tagged turn.
    pub angry_calls: u64,
}

impl CallStats {
    /// Recomputes aggregates from the full record set.
    pub fn compute(calls: &[CallRecord]) -> Self {
        let total_calls = calls.len() as u64;
        let total_turns: u64 = calls.iter().map(|c| c.turn_count).sum();
        let avg_turns_per_call = if total_calls == 0 {
            0.0
        } else {
            total_turns as f64 / total_calls as f64
        };
        let angry_calls = calls.iter().filter(|c| c.emotion_tally.angry > 0).count() as u64;
        Self {
            total_calls,
            total_turns,
            avg_turns_per_call,
            angry_calls,
        }
    }
}
