//! Static business reference data loaded once at startup.

use std::path::Path;
use tracing::{info, warn};

/// Immutable business reference text (menu, policies) injected into every
/// system prompt for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct ReferenceDocument {
    text: String,
}

impl ReferenceDocument {
    /// Loads the reference text from a UTF-8 file.
    ///
    /// A missing or unreadable file is not fatal: the agent keeps answering,
    /// just without business data, and the condition is logged.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                info!(path = %path.display(), bytes = text.len(), "loaded reference document");
                Self { text }
            }
            Err(e) => {
                warn!(path = %path.display(), "reference document unavailable, continuing without it: {}", e);
                Self::default()
            }
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
