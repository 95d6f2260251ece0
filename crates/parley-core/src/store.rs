//! Whole-file JSON persistence for customer and call records.
//!
//! Each store owns one JSON document on disk that is fully rewritten on
//! every update. Writes within a process are serialized by a per-store
//! mutex and performed via a temp file + rename so a partial write never
//! corrupts the document. There is no cross-process locking: deployments
//! are assumed single-instance, and concurrent writers from separate
//! processes would be last-write-wins over the whole file.

use crate::error::CoreError;
use chrono::Utc;
use parley_types::{CallRecord, CallStats, CustomerRecord, EmotionTags, CUSTOMER_SUMMARY_CAP};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Derives the stable storage key for a customer identity.
///
/// The hash covers the normalized (trimmed, lower-cased) contact and
/// secondary fields, so `Alice@Example.com` and `alice@example.com` key the
/// same record. One-way and deterministic; cryptographic strength is not a
/// requirement here, SHA-256 is simply what the workspace already carries.
pub fn key_for(contact: &str, secondary: &str) -> String {
    let normalized = format!(
        "{}:{}",
        contact.trim().to_lowercase(),
        secondary.trim().to_lowercase()
    );
    let digest = Sha256::digest(normalized.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Reads and parses the document at `path`.
///
/// Any failure (missing file, unreadable file, malformed JSON) yields the
/// default value: "no history yet" is never a fatal condition.
fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), "malformed store document, starting empty: {}", e);
                T::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => T::default(),
        Err(e) => {
            warn!(path = %path.display(), "failed to read store document, starting empty: {}", e);
            T::default()
        }
    }
}

/// Rewrites the document at `path` atomically (temp file + rename).
fn save<T: Serialize>(path: &Path, value: &T) -> Result<(), CoreError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CoreError::Storage(format!("serialize {}: {e}", path.display())))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .map_err(|e| CoreError::Storage(format!("write {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| CoreError::Storage(format!("rename {}: {e}", path.display())))?;
    Ok(())
}

/// Durable store of customer records keyed by identity hash.
#[derive(Debug)]
pub struct CustomerStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CustomerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Loads the full customer map. I/O failure yields an empty map.
    pub fn load(&self) -> BTreeMap<String, CustomerRecord> {
        load_or_default(&self.path)
    }

    /// Returns the record for an identity key, or a fresh default.
    pub fn get(&self, key: &str) -> CustomerRecord {
        self.load()
            .remove(key)
            .unwrap_or_else(|| CustomerRecord::new(Utc::now()))
    }

    /// Read-modify-write update for one identity.
    ///
    /// Bumps the interaction count, appends the summary keeping only the
    /// most recent [`CUSTOMER_SUMMARY_CAP`] entries, refreshes `last_seen`,
    /// and rewrites the whole document. A save failure is logged and
    /// swallowed; the returned record reflects the in-memory update, which a
    /// subsequent crash would lose.
    pub fn update(&self, key: &str, summary: String, phone: Option<String>) -> CustomerRecord {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();
        let mut customers = self.load();
        let record = customers
            .entry(key.to_string())
            .or_insert_with(|| CustomerRecord::new(now));

        record.interaction_count += 1;
        record.last_seen = now;
        if phone.is_some() {
            record.phone = phone;
        }
        record.summaries.push(summary);
        if record.summaries.len() > CUSTOMER_SUMMARY_CAP {
            let excess = record.summaries.len() - CUSTOMER_SUMMARY_CAP;
            record.summaries.drain(..excess);
        }
        let updated = record.clone();

        if let Err(e) = save(&self.path, &customers) {
            warn!(key, "customer store save failed (update kept in memory): {}", e);
        }
        updated
    }
}

/// On-disk shape of the call history document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallHistory {
    pub calls: Vec<CallRecord>,
    pub stats: CallStats,
}

/// Durable store of call records plus derived aggregate statistics.
#[derive(Debug)]
pub struct CallStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CallStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Loads the full call history. I/O failure yields an empty history.
    pub fn load(&self) -> CallHistory {
        load_or_default(&self.path)
    }

    /// Records one handled turn against a call, creating the call record on
    /// first sight, then recomputes aggregates over the full record set and
    /// rewrites the document. Save failures are logged and swallowed.
    pub fn record_turn(
        &self,
        call_id: &str,
        phone_number: Option<&str>,
        tags: &EmotionTags,
    ) -> CallRecord {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();
        let mut history = self.load();

        let record = match history.calls.iter_mut().find(|c| c.call_id == call_id) {
            Some(record) => record,
            None => {
                history
                    .calls
                    .push(CallRecord::new(call_id, phone_number.map(String::from), now));
                history.calls.last_mut().unwrap()
            }
        };
        record.turn_count += 1;
        record.last_activity_at = now;
        if record.phone_number.is_none() {
            record.phone_number = phone_number.map(String::from);
        }
        record.emotion_tally.record(tags);
        let updated = record.clone();

        history.stats = CallStats::compute(&history.calls);

        if let Err(e) = save(&self.path, &history) {
            warn!(call_id, "call store save failed (update kept in memory): {}", e);
        }
        updated
    }
}
