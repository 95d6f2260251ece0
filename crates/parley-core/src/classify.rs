//! Keyword-based emotion tagging for caller utterances.
//!
//! The word lists are configuration data rather than logic: a deployment
//! can swap the default [`Lexicon`] for its own (or eventually replace the
//! whole classifier with a model-based one) without touching call flow.

use parley_types::EmotionTags;
use serde::{Deserialize, Serialize};

/// Category word lists and predicate markers driving classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lexicon {
    pub angry: Vec<String>,
    pub frustrated: Vec<String>,
    pub urgent: Vec<String>,
    pub positive: Vec<String>,
    pub confused: Vec<String>,
    pub abusive: Vec<String>,
    /// Substrings that mark an interruption or trailing-off utterance.
    pub interruption_markers: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            angry: words(&[
                "angry", "furious", "upset", "horrible", "terrible", "stupid", "useless", "waste",
            ]),
            frustrated: words(&["frustrated", "annoyed", "fed up", "sick of", "again", "still"]),
            urgent: words(&["urgent", "immediately", "right now", "asap", "emergency"]),
            positive: words(&["thanks", "thank you", "great", "perfect", "wonderful", "helpful"]),
            confused: words(&["confused", "don't understand", "what do you mean", "unclear"]),
            abusive: words(&["damn", "hell", "idiot", "fool", "bloody"]),
            interruption_markers: words(&["...", "?"]),
        }
    }
}

/// Stateless classifier over a [`Lexicon`].
#[derive(Debug, Clone, Default)]
pub struct EmotionClassifier {
    lexicon: Lexicon,
}

impl EmotionClassifier {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    /// Tags an utterance. Pure function: no side effects, no state.
    pub fn classify(&self, text: &str) -> EmotionTags {
        let lower = text.to_lowercase();
        let matches = |list: &[String]| list.iter().any(|word| lower.contains(word.as_str()));

        EmotionTags {
            is_angry: matches(&self.lexicon.angry),
            is_frustrated: matches(&self.lexicon.frustrated),
            is_urgent: matches(&self.lexicon.urgent),
            is_positive: matches(&self.lexicon.positive),
            is_confused: matches(&self.lexicon.confused),
            is_abusive: matches(&self.lexicon.abusive),
            is_shouting: is_shouting(text),
            has_interruption: self
                .lexicon
                .interruption_markers
                .iter()
                .any(|marker| text.contains(marker.as_str())),
        }
    }
}

/// True when the text reads as shouted: it contains letters but no lowercase
/// ones, or carries more than one exclamation mark.
fn is_shouting(text: &str) -> bool {
    let has_letters = text.chars().any(|c| c.is_alphabetic());
    let all_upper = has_letters && !text.chars().any(|c| c.is_lowercase());
    all_upper || text.matches('!').count() > 1
}
