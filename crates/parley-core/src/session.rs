//! In-memory per-conversation turn buffers with timeout expiry.

use parley_types::{Role, Turn};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default session lifetime before history is discarded.
const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(300);

/// Default cap on stored turns per session (10 user/assistant exchanges).
const DEFAULT_MAX_TURNS: usize = 20;

/// Tunables for session lifetime and history depth.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Elapsed time since session start after which history is discarded.
    pub timeout: Duration,
    /// Maximum stored turns; oldest are dropped beyond this.
    pub max_turns: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SESSION_TIMEOUT,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }
}

/// One live conversation's buffered state.
#[derive(Debug, Clone)]
pub struct Session {
    pub turns: Vec<Turn>,
    pub started_at: Instant,
    pub last_activity_at: Instant,
}

impl Session {
    fn new(now: Instant) -> Self {
        Self {
            turns: Vec::new(),
            started_at: now,
            last_activity_at: now,
        }
    }
}

/// Concurrency-safe store of live sessions, keyed by call/conversation id.
///
/// Uses `std::sync::RwLock` intentionally: all lock acquisitions are brief
/// HashMap operations (get/insert/remove) that never span `.await` points,
/// making a synchronous lock safe and more efficient than
/// `tokio::sync::RwLock`. Updates to one session id never block or corrupt
/// another beyond the map-level lock.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    /// Returns a snapshot of the session for `session_id`, creating an empty
    /// one (with the timer started) when absent.
    pub fn get_or_create(&self, session_id: &str) -> Session {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!(session_id, "created session");
                Session::new(Instant::now())
            })
            .clone()
    }

    /// Appends a turn, enforcing the stored-turn cap.
    ///
    /// When the cap is exceeded, oldest turns are dropped from the front in
    /// chronological order. The drop count is rounded up to an even number so
    /// a user turn and the assistant reply to it are always evicted together,
    /// preserving role alternation in what remains.
    pub fn append_turn(&self, session_id: &str, role: Role, content: impl Into<String>) {
        let now = Instant::now();
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(now));
        session.turns.push(Turn::new(role, content));
        session.last_activity_at = now;

        if session.turns.len() > self.config.max_turns {
            let mut excess = session.turns.len() - self.config.max_turns;
            if excess % 2 == 1 && excess + 1 < session.turns.len() {
                excess += 1;
            }
            session.turns.drain(..excess);
            debug!(session_id, dropped = excess, "trimmed session history");
        }
    }

    /// True when the session exists and its lifetime has elapsed.
    ///
    /// Expiry is measured from session start, not last activity: a single
    /// very long call still gets a fresh context after the timeout.
    pub fn is_expired(&self, session_id: &str) -> bool {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        match sessions.get(session_id) {
            Some(session) => session.started_at.elapsed() > self.config.timeout,
            None => false,
        }
    }

    /// Discards history for `session_id` and restarts its timer.
    ///
    /// This is a hard boundary: no turns carry over into the new window.
    pub fn reset(&self, session_id: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.insert(session_id.to_string(), Session::new(Instant::now()));
        debug!(session_id, "reset session");
    }

    /// Removes sessions idle longer than `max_idle`, returning how many were
    /// evicted. Sessions that expired but were never revisited would
    /// otherwise linger for the process lifetime.
    pub fn reap_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, session| session.last_activity_at.elapsed() <= max_idle);
        before - sessions.len()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
